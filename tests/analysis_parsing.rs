use nutriscan::gemini::{default_tips, fallback_tips, parse_food_analysis, parse_tips};
use nutriscan::ParseError;

const REPLY: &str = r#"Here is the analysis:
```json
{
  "foodName": "Chicken Caesar Salad",
  "calories": 470,
  "macros": {"protein": 38, "carbs": 14.5, "fat": 29, "fiber": 4, "sugar": 3},
  "recommendations": ["Ask for dressing on the side", "  ", "Add whole grain croutons"]
}
```"#;

#[test]
fn parses_fenced_reply() {
    let analysis = parse_food_analysis(REPLY, None).unwrap();

    assert_eq!(analysis.food_name, "Chicken Caesar Salad");
    assert_eq!(analysis.calories, 470.0);
    assert_eq!(analysis.macros.carbs, 14.5);
    assert_eq!(analysis.macros.sugar, 3.0);
    assert_eq!(
        analysis.recommendations,
        vec!["Ask for dressing on the side", "Add whole grain croutons"]
    );
}

#[test]
fn fiber_and_sugar_are_optional() {
    let reply = r#"{"foodName": "Rice", "calories": 200, "macros": {"protein": 4, "carbs": 45, "fat": 0.4}}"#;
    let analysis = parse_food_analysis(reply, None).unwrap();

    assert_eq!(analysis.macros.fiber, 0.0);
    assert_eq!(analysis.macros.sugar, 0.0);
    assert!(analysis.recommendations.is_empty());
}

#[test]
fn blank_name_falls_back_to_query() {
    let reply = r#"{"foodName": " ", "calories": 300, "macros": {"protein": 10, "carbs": 30, "fat": 12}}"#;
    assert_eq!(
        parse_food_analysis(reply, Some("pad thai")).unwrap().food_name,
        "pad thai"
    );
    assert_eq!(
        parse_food_analysis(reply, None),
        Err(ParseError::MissingField("foodName"))
    );
}

#[test]
fn missing_required_values_are_errors() {
    let no_calories = r#"{"foodName": "Soup", "macros": {"protein": 5, "carbs": 10, "fat": 2}}"#;
    assert_eq!(
        parse_food_analysis(no_calories, None),
        Err(ParseError::MissingField("calories"))
    );

    let no_macros = r#"{"foodName": "Soup", "calories": 120}"#;
    assert_eq!(
        parse_food_analysis(no_macros, None),
        Err(ParseError::MissingField("macros"))
    );

    let no_fat = r#"{"foodName": "Soup", "calories": 120, "macros": {"protein": 5, "carbs": 10}}"#;
    assert_eq!(
        parse_food_analysis(no_fat, None),
        Err(ParseError::MissingField("fat"))
    );
}

#[test]
fn negative_values_are_rejected() {
    let reply = r#"{"foodName": "Soup", "calories": -120, "macros": {"protein": 5, "carbs": 10, "fat": 2}}"#;
    assert_eq!(
        parse_food_analysis(reply, None),
        Err(ParseError::InvalidNumber {
            field: "calories",
            value: -120.0
        })
    );
}

#[test]
fn non_json_reply_is_an_error() {
    assert_eq!(
        parse_food_analysis("I can't identify this dish.", None),
        Err(ParseError::NoJson("object"))
    );
    assert!(matches!(
        parse_food_analysis("{calories: lots}", None),
        Err(ParseError::Malformed(_))
    ));
    assert!(matches!(
        parse_food_analysis(r#"{"calories": "many"}"#, None),
        Err(ParseError::Malformed(_))
    ));
}

#[test]
fn parses_tip_array() {
    let reply = "```json\n[\"Add a vegetable to lunch\", \"\", \"Swap soda for water\"]\n```";
    assert_eq!(
        parse_tips(reply).unwrap(),
        vec!["Add a vegetable to lunch", "Swap soda for water"]
    );
}

#[test]
fn tip_errors() {
    assert_eq!(parse_tips("no tips today"), Err(ParseError::NoJson("array")));
    assert_eq!(parse_tips("[]"), Err(ParseError::MissingField("tips")));
    assert!(matches!(parse_tips("[1, 2]"), Err(ParseError::Malformed(_))));
}

#[test]
fn canned_tips() {
    assert_eq!(default_tips().len(), 4);
    assert_eq!(fallback_tips().len(), 3);
    assert_ne!(default_tips(), fallback_tips());
}

#[test]
fn ignores_braces_after_the_object() {
    let reply = r#"{"foodName": "Toast", "calories": 180, "macros": {"protein": 6, "carbs": 30, "fat": 3}}
Note: portion sizes are estimates {approximate}."#;
    let analysis = parse_food_analysis(reply, None).unwrap();
    assert_eq!(analysis.food_name, "Toast");
    assert_eq!(analysis.calories, 180.0);
}

#[test]
fn braces_inside_strings_do_not_end_the_object() {
    let reply = r#"{"foodName": "Cake {slice}", "calories": 350, "macros": {"protein": 4, "carbs": 50, "fat": 15},
"recommendations": ["Try \"fruit }\" instead"]} trailing }"#;
    let analysis = parse_food_analysis(reply, None).unwrap();
    assert_eq!(analysis.food_name, "Cake {slice}");
    assert_eq!(analysis.recommendations, vec!["Try \"fruit }\" instead"]);
}

#[test]
fn tips_stop_at_first_array() {
    let reply = "[\"Eat more fiber\"] (see [1])";
    assert_eq!(parse_tips(reply).unwrap(), vec!["Eat more fiber"]);
}

use anyhow::{anyhow, Context, Result};
use chrono::{Datelike, Local, Utc};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;

use nutriscan::client::NutriScanClient;
use nutriscan::config::Config;
use nutriscan::energy::EnergyCalculator;
use nutriscan::gemini::ImageInput;
use nutriscan::models::{
    inches_to_cm, pounds_to_kg, ActivityLevel, FitnessGoal, Gender, UserProfile,
};
use nutriscan::observability;

/// nutriscan - AI meal analysis and calorie tracking
#[derive(Parser)]
#[command(name = "nutriscan")]
#[command(about = "Analyze meals, keep a food history and track calorie goals", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Account email
    #[arg(long, global = true, env = "NUTRISCAN_EMAIL")]
    email: Option<String>,

    /// Account password
    #[arg(long, global = true, env = "NUTRISCAN_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Default)]
struct ProfileArgs {
    #[arg(long)]
    age: Option<u32>,
    /// male, female or other
    #[arg(long, value_parser = parse_enum::<Gender>)]
    gender: Option<Gender>,
    /// Body weight (kg, or lbs with --lbs)
    #[arg(long)]
    weight: Option<f64>,
    /// Height (cm, or inches with --inches)
    #[arg(long)]
    height: Option<f64>,
    /// sedentary, light, moderate, active or very_active
    #[arg(long, value_parser = parse_enum::<ActivityLevel>)]
    activity: Option<ActivityLevel>,
    /// bulking, shedding or maintenance
    #[arg(long, value_parser = parse_enum::<FitnessGoal>)]
    goal: Option<FitnessGoal>,
    /// Weight is given in pounds
    #[arg(long)]
    lbs: bool,
    /// Height is given in inches
    #[arg(long)]
    inches: bool,
}

impl ProfileArgs {
    fn is_empty(&self) -> bool {
        self.age.is_none()
            && self.gender.is_none()
            && self.weight.is_none()
            && self.height.is_none()
            && self.activity.is_none()
            && self.goal.is_none()
    }

    fn to_profile(&self) -> UserProfile {
        UserProfile {
            age: self.age,
            gender: self.gender,
            weight: self
                .weight
                .map(|w| if self.lbs { pounds_to_kg(w) } else { w }),
            height: self
                .height
                .map(|h| if self.inches { inches_to_cm(h) } else { h }),
            activity_level: self.activity,
            fitness_goal: self.goal,
            ..Default::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compute BMR, TDEE and macro targets without signing in
    Plan(ProfileArgs),
    /// Sign in and print the account id
    Login,
    /// Create an account
    Register,
    /// Show the stored profile, or update the given fields
    Profile(ProfileArgs),
    /// Estimate calories and macros for a meal
    Analyze {
        /// Dish name
        #[arg(long)]
        text: Option<String>,
        /// Photo of the meal
        #[arg(long)]
        image: Option<String>,
        /// Extra details such as portion size
        #[arg(long)]
        description: Option<String>,
        /// Save the result to the history
        #[arg(long)]
        save: bool,
    },
    /// List saved meals by day, newest first
    History,
    /// Delete a saved meal
    Delete { id: String },
    /// Today's intake against the calorie goal
    Today,
    /// Totals for one month
    Stats {
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        month: Option<u32>,
    },
    /// Per-day meal counts for one month
    Calendar {
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        month: Option<u32>,
    },
    /// This week compared with last week
    Compare,
    /// Nutrition tips for today's meals
    Tips,
}

fn parse_enum<T: DeserializeOwned>(s: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(s.to_ascii_lowercase()))
        .map_err(|_| format!("unrecognised value `{}`", s))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load(cli.config.clone())?;
    observability::init_tracing(&config.logging.level, config.logging.json)?;

    if let Commands::Plan(ref args) = cli.command {
        return plan_command(&config, args);
    }

    config.validate().map_err(|e| anyhow!(e))?;
    let email = cli.email.clone().context("--email or NUTRISCAN_EMAIL is required")?;
    let password = cli
        .password
        .clone()
        .context("--password or NUTRISCAN_PASSWORD is required")?;

    let client = match cli.command {
        Commands::Register => NutriScanClient::sign_up(&config, &email, &password).await?,
        _ => NutriScanClient::login(&config, &email, &password).await?,
    };

    run(&config, &client, cli.command).await
}

fn plan_command(config: &Config, args: &ProfileArgs) -> Result<()> {
    let calculator = EnergyCalculator::new(config.energy.min_daily_calories);
    let plan = calculator.compute(&args.to_profile())?;
    print_json(&plan)
}

async fn run(config: &Config, client: &NutriScanClient, command: Commands) -> Result<()> {
    let now = Utc::now();
    let today = Local::now().date_naive();

    match command {
        Commands::Plan(args) => plan_command(config, &args)?,
        Commands::Login | Commands::Register => {
            let user = client.session.user().await?;
            println!("signed in as {}", user.uid);
        }
        Commands::Profile(args) => {
            if args.is_empty() {
                match client.profile().await? {
                    Some(profile) => print_json(&profile)?,
                    None => println!("no profile yet; pass --age, --gender, ... to create one"),
                }
            } else if client.profile().await?.is_some() {
                client.update_profile(&args.to_profile()).await?;
                println!("profile updated");
            } else {
                client.save_profile(&args.to_profile()).await?;
                println!("profile saved");
            }
        }
        Commands::Analyze {
            text,
            image,
            description,
            save,
        } => {
            let analysis = match (image, text) {
                (Some(path), _) => {
                    let bytes = tokio::fs::read(&path)
                        .await
                        .with_context(|| format!("reading {}", path))?;
                    client
                        .analyze_image(ImageInput::from_path_bytes(&path, bytes), description.as_deref())
                        .await?
                }
                (None, Some(text)) => client.analyze_text(&text, description.as_deref()).await?,
                (None, None) => return Err(anyhow!("pass --text or --image")),
            };
            print_json(&analysis)?;
            if save {
                let id = client.save_meal(&analysis.into_new_meal(None)).await?;
                println!("saved as {}", id);
            }
        }
        Commands::History => {
            for (date, meals) in client.history_by_day(&Local).await? {
                println!("{}", date.format("%a %d %b %Y"));
                for meal in meals {
                    println!(
                        "  {}  {:<30} {:>6.0} kcal  [{}]",
                        meal.created_at.with_timezone(&Local).format("%H:%M"),
                        meal.food_name,
                        meal.calories,
                        meal.id
                    );
                }
            }
        }
        Commands::Delete { id } => {
            client.delete_meal(&id).await?;
            println!("deleted {}", id);
        }
        Commands::Today => match client.calorie_status(now, &Local).await {
            Ok(status) => print_json(&status)?,
            Err(e) if e.downcast_ref::<nutriscan::EnergyError>().is_some() => {
                let summary = client.today_stats(now, &Local).await?;
                print_json(&summary)?;
                eprintln!("no calorie goal: {}. Complete your profile to get one.", e);
            }
            Err(e) => return Err(e),
        },
        Commands::Stats { year, month } => {
            let stats = client
                .monthly_stats(year.unwrap_or(today.year()), month.unwrap_or(today.month()), &Local)
                .await?;
            print_json(&stats)?;
        }
        Commands::Calendar { year, month } => {
            let calendar = client
                .month_calendar(year.unwrap_or(today.year()), month.unwrap_or(today.month()), &Local)
                .await?;
            println!("  Su   Mo   Tu   We   Th   Fr   Sa");
            for week in &calendar.weeks {
                let row: Vec<String> = week
                    .iter()
                    .map(|cell| match cell {
                        Some(day) if day.meal_count > 0 => {
                            format!("{:>2}*{}", day.date.day(), day.meal_count.min(9))
                        }
                        Some(day) => format!("{:>2}  ", day.date.day()),
                        None => "    ".to_string(),
                    })
                    .collect();
                println!("{}", row.join(" "));
            }
        }
        Commands::Compare => print_json(&client.week_comparison(now).await?)?,
        Commands::Tips => {
            for tip in client.tips(now, &Local).await {
                println!("- {}", tip);
            }
        }
    }

    Ok(())
}

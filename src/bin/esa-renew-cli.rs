use std::ops::ControlFlow;

use clap::{Args, Parser, Subcommand};
use serde_json::json;

use esa_renew::client::JobClient;
use esa_renew::events::{LogStyle, RunEvent};
use esa_renew::jobs::JobSubmission;

#[derive(Parser)]
#[command(name = "esa-renew-cli")]
#[command(about = "Submit ESA renewal jobs and follow their progress", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show instance status without renewing
    Check(JobArgs),
    /// Renew the instance, optionally several times
    Renew {
        #[command(flatten)]
        job: JobArgs,

        /// Months per renewal
        #[arg(long, default_value_t = 1)]
        period: i64,

        /// Number of renewal attempts (1-10)
        #[arg(long = "loop", default_value_t = 1)]
        loop_count: i64,

        /// Seconds between attempts (5-600)
        #[arg(long, default_value_t = 60)]
        delay: i64,
    },
}

#[derive(Args)]
struct JobArgs {
    /// Instance id to act on
    instance_id: String,

    #[arg(long, env = "ESA_ACCESS_KEY_ID", hide_env_values = true)]
    ak: String,

    #[arg(long, env = "ESA_ACCESS_KEY_SECRET", hide_env_values = true)]
    sk: String,

    #[arg(long)]
    region: Option<String>,

    #[arg(long)]
    product_code: Option<String>,

    #[arg(long)]
    product_type: Option<String>,

    #[arg(long)]
    subscription_type: Option<String>,
}

impl JobArgs {
    fn into_submission(self, mode: &str) -> JobSubmission {
        JobSubmission {
            mode: Some(mode.to_string()),
            ak: self.ak,
            sk: self.sk,
            instance_id: self.instance_id,
            advanced: Some(json!({
                "productCode": self.product_code.unwrap_or_default(),
                "productType": self.product_type.unwrap_or_default(),
                "region": self.region.unwrap_or_default(),
                "subscriptionType": self.subscription_type.unwrap_or_default(),
            })),
            ..JobSubmission::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = JobClient::new(&cli.url);

    let submission = match cli.command {
        Commands::Check(job) => job.into_submission("check"),
        Commands::Renew { job, period, loop_count, delay } => JobSubmission {
            renew_period: Some(period),
            loop_count: Some(loop_count),
            rate_limit: Some(delay),
            ..job.into_submission("renew")
        },
    };

    let job_id = client.submit(&submission).await?;
    eprintln!("job {}", job_id);

    let terminal = client
        .follow(&job_id, |event| {
            print_event(event);
            ControlFlow::Continue(())
        })
        .await?;

    match terminal {
        Some(RunEvent::Done(_)) => Ok(()),
        Some(RunEvent::Fatal(f)) => Err(f.message.into()),
        _ => Err("stream ended without a result".into()),
    }
}

fn print_event(event: &RunEvent) {
    match event {
        RunEvent::Log(log) => {
            let marker = match log.style {
                LogStyle::Error => "!",
                LogStyle::Success => "+",
                LogStyle::Bold => "*",
                LogStyle::Mute | LogStyle::Normal => " ",
            };
            println!("{} {} {}", log.time, marker, log.line);
        }
        RunEvent::Tick(tick) => eprint!("\r  {:>3}s ", tick.left),
        RunEvent::Order(order) => println!("order {}", order.order_id),
        RunEvent::Status(status) if status.found => println!(
            "status: {} (renew: {}), ends {} ({} days)",
            status.status.as_deref().unwrap_or("-"),
            status.renew_status.as_deref().unwrap_or("-"),
            status.end_shanghai.as_deref().unwrap_or("-"),
            status
                .days_left
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ),
        RunEvent::Status(_) => println!("status: instance not found"),
        RunEvent::Fatal(f) => eprintln!("fatal: {}", f.message),
        RunEvent::Hello(_) | RunEvent::Done(_) => {}
    }
}

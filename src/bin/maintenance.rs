use std::env;

use anyhow::{Context, Result};

use coursify_backend::{config::AppConfig, db, reminders};

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("requeue-failed-reminders") => requeue_failed_reminders()?,
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\nUsage: maintenance requeue-failed-reminders");
            std::process::exit(1);
        }
        None => {
            eprintln!("Usage: maintenance requeue-failed-reminders");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn requeue_failed_reminders() -> Result<()> {
    let config = AppConfig::from_env()?;
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let requeued =
        reminders::requeue_failed(&mut conn).context("failed to requeue reminders")?;

    if requeued == 0 {
        println!("No failed reminders found.");
    } else {
        println!("Requeued {requeued} failed reminders.");
    }

    Ok(())
}

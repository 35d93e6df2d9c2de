use vercel_runtime::Error;

use guardian_scan::db::get_pool;
use guardian_scan::repo::alert;

fn parse_flag_value(args: &[String], flag: &str) -> Option<String> {
  args.iter().position(|a| a == flag).and_then(|idx| args.get(idx + 1)).cloned()
}

#[tokio::main]
async fn main() -> Result<(), Error> {
  let args: Vec<String> = std::env::args().collect();

  let child_profile_id = parse_flag_value(&args, "--child-profile-id").and_then(|v| v.trim().parse::<i64>().ok());
  let Some(child_profile_id) = child_profile_id else {
    eprintln!("Missing required --child-profile-id");
    eprintln!("Example: cargo run --bin local_youtube_alerts_smoke -- --child-profile-id 7");
    return Ok(());
  };

  let pool = get_pool().await?;
  let alerts = alert::list_for_child(pool, child_profile_id, false).await;

  match alerts {
    Ok(rows) if rows.is_empty() => {
      println!("ok=true rows=0");
    }
    Ok(rows) => {
      let newest = &rows[0];
      println!("ok=true rows={} newest_id={} alert_type={} severity={} created_at={}", rows.len(), newest.id, newest.alert_type, newest.severity, newest.created_at);
    }
    Err(err) => {
      eprintln!("ok=false error={}", err);
    }
  }

  Ok(())
}

use keeper_client::{SyncError, SyncReport};

use crate::grpc::{setup_vault, Context};

fn print_sync_report(report: &SyncReport) {
    if report.is_noop() {
        println!("✓ Already in sync");
        return;
    }
    println!("✓ Sync complete");
    println!("  Pulled: {} new, {} updated", report.pulled_new, report.pulled_updated);
    println!(
        "  Pushed: {} new, {} updated",
        report.pushed_created, report.pushed_updated
    );
}

pub async fn cmd_sync(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let (vault, mut client) = setup_vault(ctx).await?;

    match vault.sync(&mut client).await {
        Ok(report) => {
            print_sync_report(&report);
            Ok(())
        }
        Err(SyncError { phase, report, source }) => {
            if !report.is_noop() {
                println!("Partial progress before the {} step failed: {}", phase, report);
            }
            Err(format!("Sync failed during {}: {}", phase, source).into())
        }
    }
}

//! Environment readiness check.

use std::path::Path;

use anyhow::Result;
use rsc_harvest::session::chromium::CHROME_ENV;
use rsc_harvest::{find_chromium, HarvestConfig};

/// Report browser discovery, the active configuration and the output root.
pub fn run(config_path: Option<&Path>) -> Result<()> {
    println!("rsc-harvest doctor");
    println!("==================");
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    let config = match HarvestConfig::resolve(config_path) {
        Ok(config) => {
            println!("[OK] Configuration loaded");
            config
        }
        Err(e) => {
            println!("[!!] Configuration unusable: {e}");
            println!();
            println!("Status: NOT READY");
            return Ok(());
        }
    };

    let chromium = config.chrome_executable.clone().or_else(find_chromium);
    match &chromium {
        Some(path) if path.exists() => println!("[OK] Chromium found: {}", path.display()),
        Some(path) => println!("[!!] Configured Chromium missing: {}", path.display()),
        None => println!("[!!] Chromium NOT found. Install Chrome or set {CHROME_ENV}."),
    }

    let root = &config.output_root;
    let root_ok = output_root_writable(root);
    if root_ok {
        println!("[OK] Output root writable: {}", root.display());
    } else {
        println!("[!!] Output root not writable: {}", root.display());
    }

    println!();
    let ready = chromium.is_some_and(|p| p.exists()) && root_ok;
    println!("Status: {}", if ready { "READY" } else { "NOT READY" });
    Ok(())
}

/// Whether a file can be created under `root` (creating `root` if needed).
fn output_root_writable(root: &Path) -> bool {
    if std::fs::create_dir_all(root).is_err() {
        return false;
    }
    let probe = root.join(format!(".rsc-harvest-doctor-{}", std::process::id()));
    let ok = std::fs::write(&probe, b"ok").is_ok();
    let _ = std::fs::remove_file(&probe);
    ok
}

use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // Any argument at all gets the help text
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Never list variables that hold secrets (the code signing secret, provider keys)
    const DISPLAY_ENVS: [&str; 13] = [
        "RUST_LOG",
        "BXO_HOST",
        "BXO_PORT",
        "BXO_DATABASE_URL",
        "BXO_HOLD_DURATION_MINUTES",
        "BXO_MAX_TICKETS_PER_ORDER",
        "BXO_SWEEP_INTERVAL_SECS",
        "BXO_CODE_VALIDITY_DAYS",
        "BXO_PROVIDER_TIMEOUT_SECS",
        "BXO_WEBHOOK_SIGNATURE_CHECKS",
        "BXO_NOTIFICATION_URL",
        "BXO_PAYSTACK_BASE_URL",
        "BXO_PAYSTACK_CALLBACK_URL",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}

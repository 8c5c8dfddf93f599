use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::compose::ServiceStatus;

pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn step(num: usize, total: usize, msg: &str) {
    println!(
        "{} {}",
        style(format!("[{}/{}]", num, total)).bold().cyan(),
        msg
    );
}

pub fn success(msg: &str) {
    println!("{} {}", style("✓").bold().green(), msg);
}

pub fn error(msg: &str) {
    eprintln!("{} {}", style("✗").bold().red(), msg);
}

pub fn warning(msg: &str) {
    eprintln!("{} {}", style("!").bold().yellow(), msg);
}

pub fn info(msg: &str) {
    println!("{} {}", style("→").bold().blue(), msg);
}

pub fn header(msg: &str) {
    println!("\n{}", style(msg).bold().underlined());
}

/// Print compose service states, marking the ones that are not up.
pub fn status_table(services: &[ServiceStatus]) {
    if services.is_empty() {
        println!("  (no services reported)");
        return;
    }

    let width = services
        .iter()
        .map(|s| s.name.len())
        .max()
        .unwrap_or(0)
        .max("SERVICE".len());

    println!(
        "  {:<width$}  {:<10}  {}",
        style("SERVICE").bold(),
        style("STATE").bold(),
        style("STATUS").bold(),
        width = width
    );
    for svc in services {
        let state = if svc.is_up() {
            style(svc.state.as_str()).green()
        } else {
            style(svc.state.as_str()).red()
        };
        println!(
            "  {:<width$}  {:<10}  {}",
            svc.name,
            state,
            svc.status,
            width = width
        );
    }
}

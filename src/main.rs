use lease_election::config::ElectionConfig;
use lease_election::store::HttpStore;
use lease_election::supervisor::Supervisor;
use log::info;
use std::fmt::Display;
use std::io::Write;

/// `[actor] [time] message` for messages tagged with an actor id, `[time] message` otherwise.
fn console_line(timestamp: impl Display, message: &str) -> String {
    match message
        .strip_prefix('[')
        .and_then(|tagged| tagged.split_once("] "))
    {
        Some((actor_id, rest)) => format!("[{}] [{}] {}", actor_id, timestamp, rest),
        None => format!("[{}] {}", timestamp, message),
    }
}

#[actix::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let line = console_line(buf.timestamp_seconds(), &record.args().to_string());
            writeln!(buf, "{}", line)
        })
        .init();

    let config = ElectionConfig::default();
    let mut supervisor = Supervisor::start(&config, HttpStore::new(config.endpoint.clone()));

    let interrupted = tokio::select! {
        _ = tokio::signal::ctrl_c() => true,
        _ = supervisor.wait() => false,
    };
    if interrupted {
        info!("interrupted");
        supervisor.shutdown().await;
    } else {
        info!("all actors stopped");
    }
}

#[cfg(test)]
mod test_console {
    use super::*;

    #[test]
    fn actor_id_leads() {
        assert_eq!(
            console_line("2026-10-19T08:00:00Z", "[3] -> gain"),
            "[3] [2026-10-19T08:00:00Z] -> gain"
        );
    }

    #[test]
    fn untagged_message() {
        assert_eq!(
            console_line("2026-10-19T08:00:00Z", "starting 30 actors"),
            "[2026-10-19T08:00:00Z] starting 30 actors"
        );
    }
}

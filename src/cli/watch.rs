//! Watch mode - poll for module changes and report them

use std::path::PathBuf;

use anyhow::Result;

use modwatch::autotest::CONTEXT_KEY;
use modwatch::config::Config;
use modwatch::monitor::{interval_from_secs, DEFAULT_INTERVAL, DEFAULT_REFRESH_FACTOR};
use modwatch::{Application, Autotest, Monitor};

use super::display::{print_event, print_event_json};
use super::signal::{check_interrupted, setup_signal_handler};
use super::{monitor_options, Cli};

pub fn cmd_watch(cli: &Cli, config: &Config, paths: &[PathBuf], autotest: bool) -> Result<()> {
    // Validate before touching the filesystem
    let interval = match cli.interval {
        Some(secs) => interval_from_secs(secs)?,
        None => DEFAULT_INTERVAL,
    };
    let refresh_factor = cli.refresh_factor.unwrap_or(DEFAULT_REFRESH_FACTOR);

    let options = monitor_options(cli, config, paths);
    let roots = options.roots.clone();
    let mut app = Application::new(Monitor::new(options)?);

    if autotest {
        app.install(Autotest::new(config.test_base_or_default()));
    }
    let json = cli.json;
    app.install_fn(move |event, _, context| {
        let tests: Option<Vec<String>> = autotest.then(|| {
            context
                .get(CONTEXT_KEY)
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default()
        });
        if json {
            print_event_json(event, tests.as_deref())?;
        } else {
            print_event(event, tests.as_deref());
        }
        Ok(None)
    });

    setup_signal_handler(app.monitor().stop_handle());

    if !cli.quiet {
        let shown: Vec<String> = roots.iter().map(|r| r.display().to_string()).collect();
        eprintln!("Watching {} for changes (Ctrl+C to stop)...", shown.join(", "));
    }

    let events = app.run(interval, refresh_factor)?;
    if check_interrupted() {
        tracing::info!(events, "Interrupted");
    } else {
        tracing::info!(events, "No modules left to watch");
    }
    Ok(())
}

//! `folio run`: verify a site against the selected suites

use clap::Args;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use folio_e2e::{
    select_suites, Browser, DriverKind, Page, PlaywrightPage, Runner, Settings, SiteServer,
    StaticPage, Viewport,
};

use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct RunArgs {
    /// Base URL of the site under test
    #[arg(long)]
    pub base_url: Option<String>,

    /// Default viewport: WIDTHxHEIGHT or a preset (iphone-x, ipad-2, ...)
    #[arg(long)]
    pub viewport: Option<Viewport>,

    /// Page driver: static or playwright
    #[arg(long)]
    pub driver: Option<DriverKind>,

    /// Browser for the playwright driver: chromium, firefox, webkit
    #[arg(long)]
    pub browser: Option<Browser>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Only suites with this name (repeatable)
    #[arg(long = "suite")]
    pub suites: Vec<String>,

    /// Only suites carrying this tag
    #[arg(long)]
    pub tag: Option<String>,

    /// Only checks whose description contains this text
    #[arg(long)]
    pub grep: Option<String>,

    /// Directory of YAML suites (default: built-in landing-page catalog)
    #[arg(long)]
    pub specs: Option<PathBuf>,

    /// Serve this directory locally and check it instead of --base-url
    #[arg(long)]
    pub site_dir: Option<PathBuf>,

    /// Abort the run after this many seconds
    #[arg(long)]
    pub run_timeout: Option<u64>,

    /// Output directory for results
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl RunArgs {
    /// Flags win over file and environment settings
    fn apply(&self, settings: &mut Settings) {
        if let Some(url) = &self.base_url {
            settings.base_url = url.clone();
        }
        if let Some(viewport) = self.viewport {
            settings.viewport = viewport;
        }
        if let Some(driver) = self.driver {
            settings.driver = driver;
        }
        if let Some(browser) = self.browser {
            settings.browser = browser;
        }
        if self.headed {
            settings.headless = false;
        }
        if let Some(specs) = &self.specs {
            settings.specs_dir = Some(specs.clone());
        }
        if let Some(output) = &self.output {
            settings.output_dir = output.clone();
        }
    }
}

/// Returns whether every check passed
pub async fn execute(args: RunArgs, mut settings: Settings, format: OutputFormat) -> anyhow::Result<bool> {
    args.apply(&mut settings);

    let site = match &args.site_dir {
        Some(dir) => {
            let server = SiteServer::serve(dir).await?;
            settings.base_url = server.base_url().to_string();
            Some(server)
        }
        None => None,
    };

    let config = settings.runner_config()?;

    let suites = super::load_suites(settings.specs_dir.as_deref())?;
    let suites = select_suites(suites, &args.suites, args.tag.as_deref(), args.grep.as_deref());
    if suites.is_empty() {
        warn!("No suites selected");
    }

    let page: Box<dyn Page> = match settings.driver {
        DriverKind::Static => Box::new(StaticPage::new()?),
        DriverKind::Playwright => Box::new(PlaywrightPage::launch(settings.playwright_config()).await?),
    };

    info!("Driver: {}, viewport: {}", settings.driver, config.viewport);

    let cancel = CancellationToken::new();
    spawn_cancellers(&cancel, args.run_timeout.map(Duration::from_secs));

    let mut runner = Runner::new(page, config).with_cancellation(cancel.clone());
    let result = runner.run_all(&suites).await;

    if let Err(e) = runner.close().await {
        warn!("Failed to close page: {}", e);
    }
    cancel.cancel();
    if let Some(server) = site {
        server.stop().await;
    }

    let report = result?;
    report.write_results(&settings.output_dir)?;
    output::print_report(&report, format);

    Ok(report.success())
}

/// Cancel `token` on Ctrl-C or once `limit` elapses
fn spawn_cancellers(token: &CancellationToken, limit: Option<Duration>) {
    let on_signal = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, abandoning remaining checks");
                on_signal.cancel();
            }
            _ = on_signal.cancelled() => {}
        }
    });

    if let Some(limit) = limit {
        let on_timeout = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(limit) => {
                    warn!("Run timeout of {} s reached, abandoning remaining checks", limit.as_secs());
                    on_timeout.cancel();
                }
                _ = on_timeout.cancelled() => {}
            }
        });
    }
}

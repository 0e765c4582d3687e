use eframe::egui;
use eframe::egui::Visuals;
use sheetsight::client::ApiClient;
use sheetsight::config::Config;
use sheetsight::dashboard::{self, DashboardState};
use sheetsight::logging::init_logging;
use std::error::Error;
use tracing::info;

pub struct SheetsightApp {
    state: DashboardState,
    client: ApiClient,
    config: Config,
}

impl SheetsightApp {
    pub fn new(config: Config, client: ApiClient) -> Self {
        Self {
            state: DashboardState::new(&config),
            client,
            config,
        }
    }
}

impl eframe::App for SheetsightApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.set_visuals(Visuals::dark());
        dashboard::show(ctx, &mut self.state, &self.client, &self.config);
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    init_logging()?;

    let config = Config::from_env()?;
    let client = ApiClient::new(&config.backend_url)?;
    info!(backend = %config.backend_url, layout = ?config.layout, "starting sheetsight");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1280.0, 820.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Sheetsight",
        options,
        Box::new(|_cc| Ok(Box::new(SheetsightApp::new(config, client)))),
    )?;

    Ok(())
}

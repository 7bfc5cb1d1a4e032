use std::{process, sync::Arc};

use plantd::{
    application::{health::HealthProbe, render::RenderService},
    config,
    infra::{
        error::InfraError,
        http::{self, AppState},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &InfraError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), InfraError> {
    let (_cli, settings) = config::load_with_cli()
        .map_err(|err| InfraError::configuration(err.to_string()))?;

    telemetry::init(&settings.logging)?;

    let render = Arc::new(RenderService::from_settings(&settings.renderer)?);
    let health = Arc::new(HealthProbe::new(
        settings.renderer.java_path.clone(),
        settings.renderer.jar_path(),
    ));

    let router = http::build_router(AppState { render, health });

    let listener = tokio::net::TcpListener::bind(settings.server.addr).await?;
    info!(
        target = "plantd::server",
        addr = %settings.server.addr,
        jar = %settings.renderer.jar_path().display(),
        temp_dir = %settings.renderer.temp_dir.display(),
        "Listening"
    );

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(InfraError::Io)?;

    Ok(())
}

use anyhow::Context;
use easyweb::{Configuration, HostEnvironment, Startup, lifecycle::shutdown_signal};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "easyweb=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let env = HostEnvironment::from_env();
    let configuration = Configuration::load(&env).context("loading configuration")?;
    let address = configuration.bind()?.hosting.address;

    tracing::info!(
        "Starting {} site from {}",
        env.name(),
        env.content_root().display()
    );
    let app = Startup::new(configuration, env)
        .build()
        .context("building the site")?;

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {}", address))?;
    tracing::info!("Listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

use rescale_core::Config;

// Use mimalloc as the global allocator: lower fragmentation under the large,
// short-lived image buffers of a batch.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let (state, router) = rescale_api::setup::initialize_app(config).await?;

    rescale_api::setup::server::start_server(&state.config, router).await?;

    Ok(())
}

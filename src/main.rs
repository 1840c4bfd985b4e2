use osfbot::discord::SerenityDiscordService;
use osfbot::{BOT_NAME, Config, Data, Error, commands, handlers, logging};

use poise::serenity_prelude::{self as serenity};
use serenity::GatewayIntents;
use tracing::{error, info};

/// Messages kept in serenity's cache so edits can show the old content
const CACHED_MESSAGES_PER_CHANNEL: usize = 200;

/// Main function to run the bot
async fn async_main() -> Result<(), Error> {
    logging::init()?;

    let config = Config::load()?;
    info!(?config, "Configuration loaded");
    let token = config.token.clone();
    let prefix = config.prefix.clone();
    let test_guilds = config.test_guilds.clone();

    let data = Data::new(config);
    let handler = handlers::Handler::new(data.clone());

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(prefix),
                ..Default::default()
            },
            pre_command: |ctx| Box::pin(logging::log_command_start(ctx)),
            post_command: |ctx| Box::pin(logging::log_command_end(ctx)),
            on_error: |error| Box::pin(logging::on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                let commands = &framework.options().commands;
                if test_guilds.is_empty() {
                    logging::log_console("Registering commands globally");
                    poise::builtins::register_globally(ctx, commands).await?;
                } else {
                    for guild_id in &test_guilds {
                        logging::log_console(&format!("Registering commands in guild {guild_id}"));
                        poise::builtins::register_in_guild(ctx, commands, *guild_id).await?;
                    }
                }

                data.prime(&SerenityDiscordService::from(ctx)).await;
                Ok(data)
            })
        })
        .build();

    let intents = GatewayIntents::non_privileged()
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_PRESENCES;

    let mut cache_settings = ::serenity::cache::Settings::default();
    cache_settings.max_messages = CACHED_MESSAGES_PER_CHANNEL;

    let mut client = serenity::ClientBuilder::new(token, intents)
        .cache_settings(cache_settings)
        .event_handler(handler)
        .framework(framework)
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down {BOT_NAME}");
            shard_manager.shutdown_all().await;
        }
    });

    info!("Starting bot...");
    client.start().await?;
    Ok(())
}

fn main() {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Error building the runtime: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(async_main()) {
        error!("Fatal error: {err}");
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

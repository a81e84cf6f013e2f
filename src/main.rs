use std::{
    fs,
    io::{self, Read},
    net::SocketAddr,
};

use anyhow::{anyhow, Context, Result};
use clap::{arg, command, value_parser, Arg, ArgMatches, Command};
use image_hooks::{
    config::RepoConfiguration,
    gateway::Gateway,
    hooks,
    providers::{get_gateway, Provider},
    server,
    updater::Updater,
};

type DefaultUpdater = Updater<Box<dyn Gateway>>;

fn parser_arg() -> Arg {
    arg!(--parser <parser> "Registry sending the hooks (quay, docker)")
        .env("IMAGE_HOOKS_PARSER")
        .default_value("quay")
}

fn string_arg<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Missing argument {name}"))
}

fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::new().filter("IMAGE_HOOKS_LOG"));

    let matches = command!()
        .subcommand_required(true)
        .arg(arg!(-p --provider <provider> "Provider info (as JSON)").env("IMAGE_HOOKS_PROVIDER"))
        .arg(
            arg!(-c --config <config> "Repository configuration")
                .env("IMAGE_HOOKS_CONFIG")
                .default_value("/etc/image-hooks/config.yaml"),
        )
        .subcommand(
            Command::new("http")
                .about("Update repositories in response to image hooks")
                .arg(
                    arg!(--port <port> "Port to serve requests on")
                        .env("IMAGE_HOOKS_PORT")
                        .value_parser(value_parser!(u16))
                        .default_value("8080"),
                )
                .arg(parser_arg()),
        )
        .subcommand(
            Command::new("update")
                .about("Apply a single image hook")
                .arg(parser_arg())
                .arg(arg!(<payload> "Path to the hook body, - to read it from stdin")),
        )
        .get_matches();

    let provider: Provider = serde_json::from_str(
        matches
            .get_one::<String>("provider")
            .ok_or_else(|| anyhow!("Missing provider info (--provider or IMAGE_HOOKS_PROVIDER)"))?
            .as_str(),
    )
    .context("failed to parse provider info")?;

    log::debug!("using provider {}", provider.name());

    let config_path = string_arg(&matches, "config")?;
    let configs = RepoConfiguration::load(config_path)
        .with_context(|| format!("failed to load repository configuration {config_path}"))?;
    let gateway = get_gateway(provider).context("failed to create a git driver")?;
    let updater = Updater::new(gateway, configs);

    match matches.subcommand() {
        Some(("http", args)) => serve(updater, args),
        Some(("update", args)) => update(updater, args),
        _ => Err(anyhow!("unknown command")),
    }
}

fn serve(updater: DefaultUpdater, args: &ArgMatches) -> Result<()> {
    let parser_name = string_arg(args, "parser")?;
    let parser = hooks::parser(parser_name)?;
    let port = *args
        .get_one::<u16>("port")
        .ok_or_else(|| anyhow!("Missing argument port"))?;
    let app = server::router(updater, parser);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async move {
            let listener = tokio::net::TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port)))
                .await
                .with_context(|| format!("failed to listen on port {port}"))?;
            log::info!("image-hooks http starting port={port} parser={parser_name}");
            axum::serve(listener, app).await?;
            Ok::<(), anyhow::Error>(())
        })
}

fn update(updater: DefaultUpdater, args: &ArgMatches) -> Result<()> {
    let parser = hooks::parser(string_arg(args, "parser")?)?;
    let payload = match string_arg(args, "payload")? {
        "-" => {
            let mut body = Vec::new();
            io::stdin().read_to_end(&mut body)?;
            body
        }
        path => fs::read(path).with_context(|| format!("failed to read {path}"))?,
    };

    let hook = parser.parse(&payload)?;
    log::debug!("applying push of {} tags={:?}", hook.repository, hook.updated_tags);

    updater.update_from_hook(&hook)?;

    log::info!("done!");

    Ok(())
}

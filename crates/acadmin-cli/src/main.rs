// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;
mod session_store;

use acadmin_api::Client;
use acadmin_app::{AppState, SessionContext, SessionEvent};
use anyhow::{Context, Result, anyhow, bail};
use config::Config;
use runtime::ApiRuntime;
use session_store::FileSessionStore;
use std::env;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::mpsc::Receiver;

const PASSWORD_ENV: &str = "ACADMIN_PASSWORD";

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `acadmin --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;
    logging::init_file_logging(&config.log_path()?)?;

    let mut client = Client::new(&config.base_url(), config.api_timeout()?).with_context(|| {
        format!(
            "invalid [api] config in {}; fix base_url/timeout values",
            options.config_path.display()
        )
    })?;

    let store = FileSessionStore::new(FileSessionStore::default_path()?);
    if options.logout {
        return sign_out(store);
    }

    let mut session = SessionContext::new(store);
    session.load()?;
    let events = session.subscribe();

    if let Some(email) = &options.login {
        let password = read_password()?;
        let grant = client.login(email, &password)?;
        session.sign_in(grant)?;
    } else if let Some(token) = &options.login_token {
        let grant = client.login_federated(token)?;
        session.sign_in(grant)?;
    }

    client.set_access_token(session.access_token().map(str::to_owned));
    if options.login.is_some() || options.login_token.is_some() {
        let profile = client.current_user().context("load signed-in user")?;
        session.set_profile(profile)?;
    }
    report(&events);

    if options.whoami {
        match session.profile() {
            Some(profile) => println!(
                "{} <{}> ({})",
                profile.display_name(),
                profile.email,
                profile.role.as_str()
            ),
            None if session.is_signed_in() => println!("signed in (profile not loaded)"),
            None => println!("not signed in"),
        }
        return Ok(());
    }

    if options.check_only || options.login.is_some() || options.login_token.is_some() {
        return Ok(());
    }

    if !session.is_signed_in() {
        bail!("not signed in -- run `acadmin --login <email>` first");
    }

    let mut state = AppState::for_role(session.is_admin());
    let mut runtime = ApiRuntime::new(client, config.page_size());
    tracing::info!(admin = session.is_admin(), "starting tui");
    acadmin_tui::run_app(&mut state, &mut runtime, &config.tui_options()?)
}

/// Forgets the saved session without decoding it, so a damaged file can
/// still be removed.
fn sign_out(store: FileSessionStore) -> Result<()> {
    let mut session = SessionContext::new(store);
    let events = session.subscribe();
    session.clear()?;
    report(&events);
    Ok(())
}

fn report(events: &Receiver<SessionEvent>) {
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::SignedIn { role } => println!("signed in as {}", role.as_str()),
            SessionEvent::ProfileLoaded(profile) => {
                println!("welcome, {}", profile.display_name());
            }
            SessionEvent::SignedOut => println!("signed out"),
        }
    }
}

fn read_password() -> Result<String> {
    if let Ok(password) = env::var(PASSWORD_ENV)
        && !password.is_empty()
    {
        return Ok(password);
    }
    eprint!("password: ");
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_owned();
    if password.is_empty() {
        bail!("empty password; set {PASSWORD_ENV} or type it on stdin");
    }
    Ok(password)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_example: bool,
    check_only: bool,
    login: Option<String>,
    login_token: Option<String>,
    logout: bool,
    whoami: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_example: false,
        check_only: false,
        login: None,
        login_token: None,
        logout: false,
        whoami: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--login" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--login requires an email address"))?;
                options.login = Some(value.as_ref().to_owned());
            }
            "--login-token" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--login-token requires an identity token"))?;
                options.login_token = Some(value.as_ref().to_owned());
            }
            "--logout" => {
                options.logout = true;
            }
            "--whoami" => {
                options.whoami = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    if options.login.is_some() && options.login_token.is_some() {
        bail!("--login and --login-token are mutually exclusive");
    }
    if options.logout && (options.login.is_some() || options.login_token.is_some()) {
        bail!("--logout cannot be combined with --login or --login-token");
    }

    Ok(options)
}

fn print_help() {
    println!("acadmin");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --check                  Validate config and saved session, then exit");
    println!("  --login <email>          Sign in (password from {PASSWORD_ENV} or stdin)");
    println!("  --login-token <token>    Sign in with an identity provider token");
    println!("  --logout                 Forget the saved session");
    println!("  --whoami                 Print the signed-in user");
    println!("  --help                   Show this help");
}

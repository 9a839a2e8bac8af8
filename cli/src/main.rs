/*
 * main.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of mgsieve, a ManageSieve client.
 *
 * mgsieve is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * mgsieve is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with mgsieve.  If not, see <http://www.gnu.org/licenses/>.
 */

//! mgsieve: command-line ManageSieve client.
//!
//! Connects, always upgrades with STARTTLS, authenticates with PLAIN and then runs the
//! requested script actions in a fixed order: list, upload, check, download, rename, delete,
//! activate. A failed action is reported and the next one still runs unless the connection
//! was lost.

mod prompt;
mod script;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use mgsieve_core::config::{self, ServerProfile};
use mgsieve_core::{ScriptEntry, SieveError, SieveSession};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use crate::script::{format_size, script_name_from_path};

#[derive(Parser, Debug)]
#[command(name = "mgsieve")]
#[command(version)]
#[command(about = "ManageSieve (RFC 5804) client: manage Sieve scripts on a mail server", long_about = None)]
struct Args {
    /// Server host name or address
    #[arg(short, long, value_name = "HOST")]
    connect: Option<String>,

    /// Server port [default: 4190]
    #[arg(short, long)]
    port: Option<u16>,

    /// Name the server certificate must match, if not the host name
    #[arg(long = "ssl-cn", value_name = "NAME")]
    ssl_cn: Option<String>,

    /// Login name
    #[arg(short, long)]
    user: Option<String>,

    /// Password (prompted for when absent)
    #[arg(long, env = "MGSIEVE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Upload a script; the script name is the file name without extension
    #[arg(long, value_name = "FILE")]
    upload: Option<PathBuf>,

    /// Validate a script without storing it
    #[arg(long, value_name = "FILE")]
    check: Option<PathBuf>,

    /// Download a script (to stdout unless --output is given)
    #[arg(short, long, value_name = "SCRIPT")]
    download: Option<String>,

    /// File to write a downloaded script to
    #[arg(short, long, value_name = "FILE", requires = "download")]
    output: Option<PathBuf>,

    /// Rename a script
    #[arg(long, num_args = 2, value_names = ["OLD", "NEW"])]
    rename: Option<Vec<String>>,

    /// Delete a script
    #[arg(long, value_name = "SCRIPT")]
    delete: Option<String>,

    /// Make a script the active one
    #[arg(short, long, value_name = "SCRIPT")]
    active: Option<String>,

    /// List scripts
    #[arg(short, long)]
    list: bool,

    /// Print server capabilities
    #[arg(long)]
    caps: bool,

    /// Accept any TLS certificate (insecure)
    #[arg(short = 'k', long = "ignore-ssl-warnings")]
    ignore_ssl_warnings: bool,

    /// More logging (-v debug, -vv wire trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Server profile [default: ~/.mgsieve/profile.xml]
    #[arg(long, value_name = "FILE")]
    profile: Option<PathBuf>,

    /// Store the effective connection settings (never the password) in the profile
    #[arg(long)]
    save_profile: bool,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "warn,mgsieve=debug,mgsieve_core=debug",
        _ => "warn,mgsieve=trace,mgsieve_core=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Profile from disk with command-line values laid over it.
fn effective_profile(args: &Args) -> Result<(ServerProfile, Option<PathBuf>)> {
    let path = args.profile.clone().or_else(config::default_profile_path);
    let mut profile = match &path {
        Some(p) => config::load_profile(p)
            .with_context(|| format!("cannot load profile {}", p.display()))?
            .unwrap_or_default(),
        None => ServerProfile::default(),
    };
    if let Some(host) = &args.connect {
        profile.host = host.clone();
    }
    if let Some(port) = args.port {
        profile.port = port;
    }
    if let Some(cn) = &args.ssl_cn {
        profile.tls_common_name = Some(cn.clone());
    }
    if let Some(user) = &args.user {
        profile.username = Some(user.clone());
    }
    profile.ignore_tls_errors |= args.ignore_ssl_warnings;
    Ok((profile, path))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);
    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("[e] {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` when some action failed but the session ended cleanly.
async fn run(args: Args) -> Result<bool> {
    let (profile, profile_path) = effective_profile(&args)?;
    if profile.host.is_empty() {
        bail!("no server given: use --connect or a profile");
    }
    if profile.username.is_none() && !args.caps {
        bail!("no user given: use --user, or --caps to only show capabilities");
    }
    if args.save_profile {
        let path = profile_path.context("no profile path (HOME not set); use --profile")?;
        config::save_profile(&path, &profile)
            .with_context(|| format!("cannot save profile {}", path.display()))?;
        debug!("profile saved to {}", path.display());
    }

    let mut session = SieveSession::connect_with(&profile.connect_options())
        .await
        .context("connect failed")?;
    debug!("connected to {}:{}", session.host(), session.port());
    session.read_greeting().await.context("bad greeting")?;
    session.capability().await.context("CAPABILITY failed")?;
    debug!("STARTTLS, certificate name {}", session.tls_server_name());
    session
        .start_tls(!profile.ignore_tls_errors)
        .await
        .context("TLS handshake failed")?;

    let Some(username) = profile.username.clone() else {
        print_capabilities(session.capabilities());
        session.logout().await.context("logout failed")?;
        return Ok(true);
    };
    let password = match &args.password {
        Some(p) => p.clone(),
        None => prompt::read_password(&format!("Enter password for {}: ", username)).await?,
    };
    session
        .authenticate(&username, &password)
        .await
        .context("authentication failed")?;

    if args.caps {
        print_capabilities(session.capabilities());
    }
    let ok = run_actions(&mut session, &args).await;
    if let Err(e) = session.logout().await {
        error!("logout failed: {}", e);
        return Ok(false);
    }
    Ok(ok)
}

fn print_capabilities(caps: &[String]) {
    println!("[-] Server capabilities:");
    for cap in caps {
        println!("  - {}", cap);
    }
}

async fn print_scripts(session: &mut SieveSession) -> Result<(), SieveError> {
    println!("[-] Scripts:");
    for line in session.list_scripts().await? {
        match ScriptEntry::parse(&line) {
            Some(entry) if entry.active => println!("  - {} (active)", entry.name),
            Some(entry) => println!("  - {}", entry.name),
            None => println!("  - {}", line),
        }
    }
    Ok(())
}

/// Report an action's outcome. Returns false to stop further actions.
fn report(action: &str, result: Result<()>, ok: &mut bool) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            eprintln!("[e] {} failed: {:#}", action, e);
            *ok = false;
            !e.downcast_ref::<SieveError>().is_some_and(SieveError::is_fatal)
        }
    }
}

async fn run_actions(session: &mut SieveSession, args: &Args) -> bool {
    let mut ok = true;

    if args.list && !report("list", print_scripts(session).await.map_err(Into::into), &mut ok) {
        return false;
    }

    if let Some(path) = &args.upload {
        if !report("upload", upload(session, path).await, &mut ok) {
            return false;
        }
    }

    if let Some(path) = &args.check {
        if !report("check", check(session, path).await, &mut ok) {
            return false;
        }
    }

    if let Some(name) = &args.download {
        let result = download(session, name, args.output.as_deref()).await;
        if !report("download", result, &mut ok) {
            return false;
        }
    }

    if let Some(names) = &args.rename {
        println!("[-] renaming script {} to {}", names[0], names[1]);
        let result = session.rename_script(&names[0], &names[1]).await;
        if !report("rename", result.map_err(Into::into), &mut ok) {
            return false;
        }
    }

    if let Some(name) = &args.delete {
        println!("[-] removing script {}", name);
        let result = session.delete_script(name).await;
        if !report("delete", result.map_err(Into::into), &mut ok) {
            return false;
        }
    }

    if let Some(name) = &args.active {
        println!("[-] activating script {}", name);
        let result = match session.set_active(name).await {
            Ok(()) => print_scripts(session).await,
            Err(e) => Err(e),
        };
        if !report("setactive", result.map_err(Into::into), &mut ok) {
            return false;
        }
    }

    ok
}

async fn upload(session: &mut SieveSession, path: &Path) -> Result<()> {
    let name = script_name_from_path(path)?;
    let content = tokio::fs::read(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    println!(
        "[-] uploading file {} as {} ({})",
        path.display(),
        name,
        format_size(content.len() as u64)
    );
    session.have_space(&name, content.len() as u64).await?;
    if let Some(warnings) = session.check_script(&content).await? {
        println!("[-] server notes: {}", warnings);
    }
    session.put_script(&name, &content).await?;
    Ok(())
}

async fn check(session: &mut SieveSession, path: &Path) -> Result<()> {
    let content = tokio::fs::read(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    match session.check_script(&content).await? {
        Some(warnings) => println!("[-] {}: OK ({})", path.display(), warnings),
        None => println!("[-] {}: OK", path.display()),
    }
    Ok(())
}

async fn download(session: &mut SieveSession, name: &str, output: Option<&Path>) -> Result<()> {
    eprintln!("[-] downloading script {}", name);
    let content = session.get_script(name).await?;
    match output {
        Some(path) => {
            tokio::fs::write(path, &content)
                .await
                .with_context(|| format!("cannot write {}", path.display()))?;
            eprintln!(
                "[-] wrote {} to {}",
                format_size(content.len() as u64),
                path.display()
            );
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&content).await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}

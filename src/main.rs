use std::{
    path::{Path, PathBuf},
    process,
    time::Duration,
};

use clap::{Parser, Subcommand};
use greeter_cli::{
    config::{
        self, CliConfig, ConfigError, ProgramIdentity, DEFAULT_PROGRAM_KEYPAIR, DEFAULT_PROGRAM_SO,
    },
    greeter::{self, ProvisionPolicy, Session, StageError, DEFAULT_SEED},
    ledger::{LedgerTransport, LAMPORTS_PER_SOL},
    rpc::RpcClient,
};
use greeting_core::{create_with_seed, schema::SAMPLE_MESSAGE, Keypair, GREETING_SCHEMA, RECORD_SIZE};

#[derive(Parser)]
#[command(name = "greeter", version, about = "Say hello to an on-ledger greeting counter")]
struct Cli {
    /// JSON-RPC endpoint; overrides `json_rpc_url` from the CLI config.
    #[arg(long, global = true)]
    url: Option<String>,

    /// Payer keypair file; overrides `keypair_path` from the CLI config.
    #[arg(long, global = true)]
    keypair: Option<PathBuf>,

    /// Ledger CLI config (default ~/.config/solana/cli/config.yml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true, default_value = DEFAULT_PROGRAM_KEYPAIR)]
    program_keypair: PathBuf,

    /// Base58 program id; takes precedence over `--program-keypair`.
    #[arg(long, global = true)]
    program_id: Option<String>,

    #[arg(long, global = true, default_value = DEFAULT_PROGRAM_SO)]
    program_so: PathBuf,

    #[arg(long, global = true, default_value = DEFAULT_SEED)]
    seed: String,

    /// How long to wait for a transaction or airdrop to confirm.
    #[arg(long, global = true, default_value_t = 60)]
    timeout_secs: u64,

    /// Reject an existing greeting account unless the program owns it and it
    /// has exactly the record size.
    #[arg(long, global = true)]
    strict_account: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fund the payer, create the greeting account if needed and greet it.
    Greet {
        #[arg(long, default_value = SAMPLE_MESSAGE)]
        message: String,
    },
    /// Print the stored greeting without sending anything.
    Report,
    /// Print the derived greeting account address.
    Address,
    /// Write a fresh keypair file.
    Keygen {
        #[arg(long)]
        out: PathBuf,
    },
    /// Print the greeting record layout.
    Schema,
}

fn fail(code: i32, err: impl std::fmt::Display) -> ! {
    eprintln!("error: {err}");
    process::exit(code)
}

fn sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

fn load_config(cli: &Cli) -> Result<CliConfig, ConfigError> {
    match &cli.config {
        Some(path) => CliConfig::load(path),
        None => CliConfig::load(&CliConfig::default_path()?),
    }
}

fn load_program(cli: &Cli) -> ProgramIdentity {
    match &cli.program_id {
        Some(text) => ProgramIdentity {
            id: greeter::parse_key(text).unwrap_or_else(|err| fail(2, err)),
            artifact: cli.program_so.clone(),
        },
        None => ProgramIdentity::load(&cli.program_keypair, &cli.program_so).unwrap_or_else(|err| fail(2, err)),
    }
}

fn load_payer(cli: &Cli, cfg: &Result<CliConfig, ConfigError>) -> Keypair {
    config::resolve_payer(cli.keypair.as_deref(), cfg).unwrap_or_else(|err| fail(2, err))
}

fn policy(cli: &Cli) -> ProvisionPolicy {
    if cli.strict_account {
        ProvisionPolicy::Strict
    } else {
        ProvisionPolicy::Trust
    }
}

//==================== pipeline ====================//

fn greet<L: LedgerTransport>(session: &mut Session<L>, message: &str) -> Result<(), StageError> {
    let info = session.connect()?;
    println!("Connection to cluster established: {} (version {})", info.endpoint, info.version);

    let funding = session.establish_payer()?;
    if let Some(lamports) = funding.airdropped {
        println!("Airdropped {} SOL to cover rent and fees", sol(lamports));
    }
    println!(
        "Using account {} containing {} SOL to pay for fees",
        session.payer().pubkey(),
        sol(funding.balance)
    );

    session.verify_program()?;
    println!("Using program {}", session.program().id);

    let account = session.provision_account()?;
    if account.created {
        println!("Created account {} to say hello to", account.address);
    }

    println!("Saying hello to {}", account.address);
    session.greet(message)?;

    let record = session.read()?;
    println!("{} has been greeted {} time(s)", account.address, record.counter);
    Ok(())
}

fn report<L: LedgerTransport>(session: &mut Session<L>) -> Result<(), StageError> {
    let info = session.connect()?;
    println!("Connection to cluster established: {} (version {})", info.endpoint, info.version);
    session.verify_program()?;
    let record = session.read()?;
    if let Some(address) = session.address() {
        println!("{address} has been greeted {} time(s)", record.counter);
    }
    println!("Last message: {:?}", record.message);
    Ok(())
}

fn pipeline_cmd(cli: &Cli, message: Option<&str>) {
    let cfg = load_config(cli);
    let url = config::resolve_rpc_url(cli.url.as_deref(), &cfg);
    let client = RpcClient::new(&url, Duration::from_secs(cli.timeout_secs)).unwrap_or_else(|err| fail(2, err));
    let payer = load_payer(cli, &cfg);
    let program = load_program(cli);
    let mut session = Session::new(client, payer, program, cli.seed.as_str()).with_policy(policy(cli));
    let outcome = match message {
        Some(message) => greet(&mut session, message),
        None => report(&mut session),
    };
    if let Err(err) = outcome {
        fail(1, err);
    }
}

//==================== utility commands ====================//

fn address_cmd(cli: &Cli) {
    let cfg = load_config(cli);
    let payer = load_payer(cli, &cfg);
    let program = load_program(cli);
    let address = create_with_seed(&payer.pubkey(), &cli.seed, &program.id).unwrap_or_else(|err| fail(2, err));
    println!("{address}");
}

fn keygen_cmd(out: &Path) {
    let keypair = Keypair::generate();
    config::write_keypair_file(&keypair, out).unwrap_or_else(|err| fail(2, err));
    println!("keypair {} written → {}", keypair.pubkey(), out.display());
}

fn schema_cmd() {
    println!("{} v{}", GREETING_SCHEMA.name, GREETING_SCHEMA.version);
    for field in GREETING_SCHEMA.fields {
        println!("  {}: {}", field.name, field.kind.tag());
    }
    println!("fingerprint: {}", GREETING_SCHEMA.fingerprint_hex());
    println!("record size: {RECORD_SIZE} bytes");
    if let Err(err) = GREETING_SCHEMA.ensure_compatible(&greeting_program::schema_fingerprint()) {
        fail(1, format_args!("bundled program disagrees: {err}"));
    }
    println!("bundled program: compatible");
}

//==================== main ====================//

fn main() {
    let cli = Cli::parse();
    match &cli.command {
        Command::Greet { message } => pipeline_cmd(&cli, Some(message)),
        Command::Report => pipeline_cmd(&cli, None),
        Command::Address => address_cmd(&cli),
        Command::Keygen { out } => keygen_cmd(out),
        Command::Schema => schema_cmd(),
    }
}

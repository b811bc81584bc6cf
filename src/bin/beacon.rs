//! Beacon CLI: mutable key-value records on a singleton coin lineage.
//!
//! Commands:
//!   beacon init                                    write a config template
//!   beacon mint [fee]                              mint a record, print its id
//!   beacon add-pair <id> <key> <value> [fee]       prepend a pair
//!   beacon remove-pair <id> <index> [fee]          delete the pair at index
//!   beacon change-owner <id> <pubkey-hex> [fee]    hand over ownership
//!   beacon freeze <id> [fee]                       terminally freeze
//!   beacon get-data <id>                           print the decoded record

use beacon_core::record::{format_identity, parse_identity, RecordState};
use beacon_core::{Config, Error, WalletSession};
use chia_bls::PublicKey;

fn print_usage() {
    println!(
        r#"beacon: key-value records anchored to a singleton coin lineage

Usage: beacon <command> [args]

Commands:
  init                                     Write a config template to {config}
  mint [fee]                               Mint a new record, prints its identity
  add-pair <id> <key> <value> [fee]        Prepend a key-value pair
  remove-pair <id> <index> [fee]           Remove the pair at an index
  change-owner <id> <pubkey-hex> [fee]     Replace the owner key
  freeze <id> [fee]                        Freeze the record (terminal)
  get-data <id>                            Print version and entries as JSON

Record ids are 0x-prefixed, 64 hex characters. Fees default to 0.
Config path comes from ${env} or defaults to {config}."#,
        config = beacon_core::config::CONFIG_FILE,
        env = beacon_core::config::CONFIG_ENV,
    );
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(2);
    }

    let result = match args[1].as_str() {
        "init" => cmd_init(),
        "mint" => cmd_mint(&args[2..]).await,
        "add-pair" => cmd_add_pair(&args[2..]).await,
        "remove-pair" => cmd_remove_pair(&args[2..]).await,
        "change-owner" => cmd_change_owner(&args[2..]).await,
        "freeze" => cmd_freeze(&args[2..]).await,
        "get-data" => cmd_get_data(&args[2..]).await,
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_config() -> Result<Config, Error> {
    Config::load(Config::resolve_path())
}

fn connect() -> Result<WalletSession<beacon_core::FullNodeRpc>, Error> {
    WalletSession::connect(&load_config()?)
}

fn cmd_init() -> Result<(), Error> {
    let path = Config::resolve_path();
    if path.exists() {
        return Err(Error::Config(format!("{} already exists", path.display())));
    }
    Config::default().save(&path)?;
    println!("Wrote config template to {}", path.display());
    println!("Fill in master_secret_key (32 bytes hex) before use.");
    Ok(())
}

async fn cmd_mint(args: &[String]) -> Result<(), Error> {
    let fee = parse_fee(args.first())?;
    let session = connect()?;
    let (tx_id, identity) = session.mint(fee).await?;
    println!("Minted a new record: {}", format_identity(&identity));
    println!("Track transaction: 0x{}  (fee: {fee})", hex::encode(tx_id));
    println!("Store the record id somewhere safe; the wallet does not keep it.");
    Ok(())
}

async fn cmd_add_pair(args: &[String]) -> Result<(), Error> {
    let [id, key, value, rest @ ..] = args else {
        return Err(Error::Config("usage: add-pair <id> <key> <value> [fee]".to_string()));
    };
    let identity = parse_identity(id)?;
    let fee = parse_fee(rest.first())?;
    let session = connect()?;
    let tx_id = session
        .add_pair(identity, key.as_bytes().to_vec().into(), value.as_bytes().to_vec().into(), fee)
        .await?;
    println!("Added pair ({key:?}, {value:?}) in transaction 0x{}", hex::encode(tx_id));
    Ok(())
}

async fn cmd_remove_pair(args: &[String]) -> Result<(), Error> {
    let [id, index, rest @ ..] = args else {
        return Err(Error::Config("usage: remove-pair <id> <index> [fee]".to_string()));
    };
    let identity = parse_identity(id)?;
    let index: u64 =
        index.parse().map_err(|_| Error::Config(format!("bad index: {index}")))?;
    let fee = parse_fee(rest.first())?;
    let session = connect()?;
    let tx_id = session.remove_pair_at(identity, index, fee).await?;
    println!("Removed pair at {index} in transaction 0x{}", hex::encode(tx_id));
    Ok(())
}

async fn cmd_change_owner(args: &[String]) -> Result<(), Error> {
    let [id, key, rest @ ..] = args else {
        return Err(Error::Config("usage: change-owner <id> <pubkey-hex> [fee]".to_string()));
    };
    let identity = parse_identity(id)?;
    let new_owner = parse_public_key(key)?;
    let fee = parse_fee(rest.first())?;
    let session = connect()?;
    let tx_id = session.change_owner(identity, new_owner, fee).await?;
    println!("Ownership changed to {key} in transaction 0x{}", hex::encode(tx_id));
    Ok(())
}

async fn cmd_freeze(args: &[String]) -> Result<(), Error> {
    let [id, rest @ ..] = args else {
        return Err(Error::Config("usage: freeze <id> [fee]".to_string()));
    };
    let identity = parse_identity(id)?;
    let fee = parse_fee(rest.first())?;
    let session = connect()?;
    let tx_id = session.freeze(identity, fee).await?;
    println!("Record frozen in transaction 0x{}", hex::encode(tx_id));
    Ok(())
}

async fn cmd_get_data(args: &[String]) -> Result<(), Error> {
    let [id] = args else {
        return Err(Error::Config("usage: get-data <id>".to_string()));
    };
    let identity = parse_identity(id)?;
    let session = connect()?;
    let state = session.get_data(identity).await?;
    println!("{}", render_state(&state));
    Ok(())
}

fn parse_fee(arg: Option<&String>) -> Result<u64, Error> {
    match arg {
        None => Ok(0),
        Some(s) => s.parse().map_err(|_| Error::Config(format!("bad fee: {s}"))),
    }
}

fn parse_public_key(s: &str) -> Result<PublicKey, Error> {
    let raw = hex::decode(s.strip_prefix("0x").unwrap_or(s))
        .map_err(|_| Error::Key(format!("owner key is not hex: {s}")))?;
    let arr: [u8; 48] = raw
        .try_into()
        .map_err(|_| Error::Key("owner key must be 48 bytes".to_string()))?;
    PublicKey::from_bytes(&arr).map_err(|_| Error::Key("owner key is not a valid point".to_string()))
}

fn render_state(state: &RecordState) -> String {
    let entries: Vec<serde_json::Value> = state
        .entries
        .iter()
        .enumerate()
        .map(|(i, (k, v))| {
            serde_json::json!([i, [display_bytes(k.as_ref()), display_bytes(v.as_ref())]])
        })
        .collect();
    serde_json::json!({
        "version": state.version,
        "frozen": state.version == 0,
        "data": entries,
    })
    .to_string()
}

/// Entries are opaque bytes; show text where possible, hex otherwise.
fn display_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => format!("0x{}", hex::encode(bytes)),
    }
}

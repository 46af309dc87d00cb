//! CLI for the Sawbuck marketplace.
//!
//! Reads go straight to the REST API (or an offline snapshot); offer
//! acceptance runs through the analyzer's negotiation before anything is
//! submitted.

use clap::{Args, Parser, Subcommand};
use sawbuck_analyzer::reporter::{
    render_account, render_asset, render_asset_list, render_offer_detail, render_offer_list,
    render_quote,
};
use sawbuck_analyzer::sink::json_stream::JsonStreamSink;
use sawbuck_analyzer::sink::{holding_rows, HoldingRow, OfferRow};
use sawbuck_analyzer::{
    accept_gate, offer_gate, request_gate, AcceptancePlan, OfferBook, OfferDraft, RuleSelection,
    TargetChoice,
};
use sawbuck_core::types::validate_public_key;
use sawbuck_core::{
    AccountUpdate, Credentials, MarketError, NewAccount, NewAsset, NewHolding, RuleKind,
};
use sawbuck_provider::rest::DEFAULT_API_URL;
use sawbuck_provider::{fetch_snapshot, ClientConfig, MarketplaceApi, MemoryMarket, RestClient};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "sawbuck", version, about = "Sawbuck marketplace client")]
struct Cli {
    #[command(flatten)]
    market: MarketArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct MarketArgs {
    /// Base URL of the marketplace REST API.
    #[arg(long, global = true, env = "SAWBUCK_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Authorization token from `signup` or `login`.
    #[arg(long, global = true, env = "SAWBUCK_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[arg(long, global = true, env = "SAWBUCK_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// Serve everything from a JSON snapshot instead of the API.
    /// Mutations are recorded, never applied to a ledger.
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// Public key to act as in snapshot mode.
    #[arg(long, global = true, env = "SAWBUCK_SESSION", requires = "snapshot")]
    session: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an account and print its authorization token.
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },

    /// Print an authorization token for existing credentials.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Show the signed-in account.
    Whoami {
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Change fields of the signed-in account.
    UpdateAccount {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },

    Accounts {
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    Account {
        public_key: String,
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    Assets {
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show an asset and whether you may offer or request it.
    Asset {
        name: String,
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    CreateAsset {
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[command(flatten)]
        rules: RuleArgs,
    },

    CreateHolding {
        asset: String,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        quantity: Option<u64>,
    },

    /// List offers, optionally filtered by what they give or ask for.
    Offers {
        /// Only offers giving this asset.
        #[arg(long)]
        source: Option<String>,

        /// Only offers asking for this asset.
        #[arg(long)]
        target: Option<String>,

        #[arg(long, default_value_t = false)]
        json: bool,

        /// Sink output: "ndjson" writes offer and holding rows to stdout,
        /// "ndjson:/path/to/file" writes to file.
        #[arg(long)]
        sink: Option<String>,
    },

    Offer {
        id: String,
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    CreateOffer {
        /// Holding the offered asset is drawn from.
        #[arg(long)]
        source: String,

        #[arg(long)]
        source_quantity: u64,

        /// Existing holding that receives payment.
        #[arg(long, conflicts_with_all = ["free", "new_target_asset"])]
        target: Option<String>,

        /// Create a holding of this asset to receive payment.
        #[arg(long, conflicts_with = "free")]
        new_target_asset: Option<String>,

        #[arg(long, requires = "new_target_asset")]
        new_target_label: Option<String>,

        #[arg(long, default_value_t = 0)]
        target_quantity: u64,

        /// Ask for nothing in return.
        #[arg(long, default_value_t = false)]
        free: bool,

        #[arg(long)]
        label: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[command(flatten)]
        rules: RuleArgs,
    },

    /// Negotiate an acceptance without submitting it.
    Quote {
        offer: String,
        #[command(flatten)]
        selection: AcceptArgs,
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Negotiate and submit an acceptance.
    Accept {
        offer: String,
        #[command(flatten)]
        selection: AcceptArgs,
    },

    Close {
        offer: String,
    },
}

#[derive(Args, Debug)]
struct RuleArgs {
    /// Rule tag, e.g. EXCHANGE_ONCE. Repeatable.
    #[arg(long = "rule")]
    rules: Vec<RuleKind>,

    /// Comma-separated account keys; adds EXCHANGE_LIMITED_TO_ACCOUNTS.
    #[arg(long)]
    limited_to: Option<String>,
}

impl RuleArgs {
    fn selection(&self) -> RuleSelection {
        let mut selection = RuleSelection::default();
        for kind in &self.rules {
            selection.select(*kind);
        }
        if let Some(keys) = &self.limited_to {
            selection.set_keys(RuleKind::ExchangeLimitedToAccounts, keys.clone());
            selection.select(RuleKind::ExchangeLimitedToAccounts);
        }
        selection
    }
}

#[derive(Args, Debug)]
struct AcceptArgs {
    /// Quantity of the offered asset to receive.
    #[arg(long, default_value_t = 1)]
    quantity: u64,

    /// Holding that receives the offered asset.
    #[arg(long, conflicts_with = "new_holding")]
    into: Option<String>,

    /// Receive into a newly created holding with this label.
    #[arg(long)]
    new_holding: Option<String>,

    /// Holding that pays for the offer.
    #[arg(long)]
    pay_from: Option<String>,
}

impl AcceptArgs {
    fn apply(&self, plan: &mut AcceptancePlan) -> Result<(), MarketError> {
        if let Some(id) = &self.into {
            plan.select_receiver(id)?;
        }
        if let Some(label) = &self.new_holding {
            plan.select_new_holding(Some(label.clone()), None);
        }
        if let Some(id) = &self.pay_from {
            plan.select_payer(id)?;
        }
        plan.set_incoming_quantity(self.quantity)?;
        Ok(())
    }
}

impl MarketArgs {
    /// Live keys must be secp256k1 public keys. Offline snapshots may use
    /// placeholder keys, so they are looked up as given.
    fn check_account_key(&self, key: &str) -> Result<(), MarketError> {
        if self.snapshot.is_some() {
            return Ok(());
        }
        validate_public_key(key)
    }
}

fn connect(args: &MarketArgs) -> Result<Arc<dyn MarketplaceApi>, MarketError> {
    if let Some(path) = &args.snapshot {
        let mut market = MemoryMarket::from_json_file(path)?;
        if let Some(key) = &args.session {
            market = market.with_session(key.clone());
        }
        return Ok(Arc::new(market));
    }

    let config = ClientConfig::new(&args.api_url)?
        .with_timeout(Duration::from_secs(args.timeout_secs))
        .with_token(args.token.clone());
    Ok(Arc::new(RestClient::connect(config)?))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn write_sink(
    spec: &str,
    offers: &[OfferRow],
    holdings: &[HoldingRow],
) -> Result<(), Box<dyn std::error::Error>> {
    fn drain<W: Write>(
        mut sink: JsonStreamSink<W>,
        offers: &[OfferRow],
        holdings: &[HoldingRow],
    ) -> std::io::Result<usize> {
        sink.write_offers(offers)?;
        sink.write_holdings(holdings)?;
        sink.finish()
    }

    if spec == "ndjson" {
        let n = drain(JsonStreamSink::stdout(), offers, holdings)?;
        tracing::info!(rows = n, "ndjson sink: wrote to stdout");
    } else if let Some(path) = spec.strip_prefix("ndjson:") {
        let file = std::fs::File::create(path)?;
        let n = drain(JsonStreamSink::new(file), offers, holdings)?;
        tracing::info!(rows = n, path, "ndjson sink: wrote to file");
    } else {
        eprintln!("Unknown sink: {spec}. Use 'ndjson' or 'ndjson:/path'");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let api = connect(&cli.market)?;

    match cli.command {
        Commands::Signup {
            email,
            password,
            label,
            description,
        } => {
            let auth = api
                .create_account(&NewAccount {
                    email,
                    password,
                    label,
                    description,
                })
                .await?;
            println!("{}", auth.authorization);
        }

        Commands::Login { email, password } => {
            let auth = api.authorize(&Credentials { email, password }).await?;
            println!("{}", auth.authorization);
        }

        Commands::Whoami { json } => match api.session_account().await? {
            Some(account) if json => print_json(&account)?,
            Some(account) => print!("{}", render_account(&account)),
            None => println!("signed out"),
        },

        Commands::UpdateAccount {
            email,
            password,
            label,
            description,
        } => {
            let update = AccountUpdate {
                email,
                password,
                label,
                description,
            };
            if update.is_empty() {
                return Err(MarketError::invalid("nothing to update").into());
            }
            api.update_account(&update).await?;
            tracing::info!("account updated");
        }

        Commands::Accounts { json } => {
            let accounts = api.list_accounts().await?;
            if json {
                print_json(&accounts)?;
            } else {
                for account in &accounts {
                    print!("{}", render_account(account));
                }
            }
        }

        Commands::Account { public_key, json } => {
            cli.market.check_account_key(&public_key)?;
            let account = api.get_account(&public_key).await?;
            if json {
                print_json(&account)?;
            } else {
                print!("{}", render_account(&account));
            }
        }

        Commands::Assets { json } => {
            let assets = api.list_assets().await?;
            if json {
                print_json(&assets)?;
            } else {
                print!("{}", render_asset_list(&assets));
            }
        }

        Commands::Asset { name, json } => {
            let (asset, user) = tokio::try_join!(api.get_asset(&name), api.session_account())?;
            if json {
                print_json(&asset)?;
            } else {
                let offer = offer_gate(&asset, user.as_ref());
                let request = request_gate(user.as_ref());
                print!("{}", render_asset(&asset, &offer, &request));
            }
        }

        Commands::CreateAsset {
            name,
            description,
            rules,
        } => {
            let asset = api
                .create_asset(&NewAsset {
                    name,
                    description,
                    rules: rules.selection().rules(),
                })
                .await?;
            tracing::info!(asset = %asset.name, "asset created");
            println!("{}", asset.name);
        }

        Commands::CreateHolding {
            asset,
            label,
            description,
            quantity,
        } => {
            let holding = api
                .create_holding(&NewHolding {
                    asset,
                    label,
                    description,
                    quantity,
                })
                .await?;
            tracing::info!(holding = %holding.id, asset = %holding.asset, "holding created");
            println!("{}", holding.id);
        }

        Commands::Offers {
            source,
            target,
            json,
            sink,
        } => {
            let snapshot = fetch_snapshot(api.as_ref()).await?;
            let book = OfferBook::build(&snapshot);
            let entries = book.filter(source.as_deref(), target.as_deref());
            let user = api.session_key().and_then(|key| snapshot.account(key));
            tracing::info!(shown = entries.len(), total = book.len(), "offers filtered");

            if let Some(ref sink_spec) = sink {
                let rows: Vec<OfferRow> = entries.iter().map(OfferRow::from).collect();
                write_sink(sink_spec, &rows, &holding_rows(&snapshot.accounts))?;
                eprint!("{}", render_offer_list(&entries, user));
            } else if json {
                let rows: Vec<OfferRow> = entries.iter().map(OfferRow::from).collect();
                print_json(&rows)?;
            } else {
                println!("Source assets: {}", book.source_assets().join(", "));
                println!("Target assets: {}", book.target_assets().join(", "));
                print!("{}", render_offer_list(&entries, user));
            }
        }

        Commands::Offer { id, json } => {
            let snapshot = fetch_snapshot(api.as_ref()).await?;
            let book = OfferBook::build(&snapshot);
            let entry = book
                .entries()
                .iter()
                .find(|e| e.offer.id == id)
                .ok_or_else(|| MarketError::not_found(format!("offer {id}")))?;
            if json {
                print_json(&OfferRow::from(entry))?;
            } else {
                let user = api.session_key().and_then(|key| snapshot.account(key));
                let owner = entry
                    .offer
                    .owners
                    .first()
                    .and_then(|key| snapshot.account(key));
                let gate = accept_gate(entry.offer, entry.target_asset, user);
                print!("{}", render_offer_detail(entry, owner, &gate));
            }
        }

        Commands::CreateOffer {
            source,
            source_quantity,
            target,
            new_target_asset,
            new_target_label,
            target_quantity,
            free,
            label,
            description,
            rules,
        } => {
            let choice = match (free, target, new_target_asset) {
                (true, _, _) => TargetChoice::Free,
                (false, Some(id), _) => TargetChoice::Existing(id),
                (false, None, Some(asset)) => TargetChoice::NewHolding(NewHolding {
                    asset,
                    label: new_target_label,
                    ..Default::default()
                }),
                (false, None, None) => TargetChoice::Unset,
            };
            let draft = OfferDraft {
                label,
                description,
                source: Some(source),
                source_quantity,
                target: choice,
                target_quantity,
                rules: rules.selection(),
            };
            let offer = draft.submit(api.as_ref()).await?;
            println!("{}", offer.id);
        }

        Commands::Quote {
            offer,
            selection,
            json,
        } => {
            let mut plan = AcceptancePlan::load(api.clone(), &offer).await?;
            selection.apply(&mut plan)?;
            if json {
                print_json(&plan.negotiation())?;
            } else {
                print!("{}", render_quote(&plan));
            }
        }

        Commands::Accept { offer, selection } => {
            let mut plan = AcceptancePlan::load(api.clone(), &offer).await?;
            selection.apply(&mut plan)?;
            eprint!("{}", render_quote(&plan));
            let request = plan.submit(api.as_ref()).await?;
            print_json(&request)?;
        }

        Commands::Close { offer } => {
            api.close_offer(&offer).await?;
            tracing::info!(offer = %offer, "offer closed");
        }
    }

    Ok(())
}

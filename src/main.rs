use anyhow::Context;
use clap::{Parser, Subcommand};
use dialoguer::{Confirm, Password};
use room_finder::backend::{Backend, MemoryBackend, SupabaseBackend};
use room_finder::config::Config;
use room_finder::models::{ImageUpload, Listing, NewListing, Session};
use room_finder::session_store::SessionStore;
use room_finder::{
    Error, FilterCriteria, Marketplace, Operation, PropertyType, Selector, TenantPreference,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "room-finder")]
#[command(about = "Find rooms to rent and manage your own listings")]
#[command(version)]
struct Cli {
    /// Use built-in sample data instead of the hosted backend
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse available rooms
    Browse {
        /// Match against title, location, city or description
        #[arg(short, long, default_value = "")]
        search: String,

        #[arg(long, default_value = "")]
        city: String,

        /// Minimum monthly rent
        #[arg(long, default_value = "")]
        min_price: String,

        /// Maximum monthly rent
        #[arg(long, default_value = "")]
        max_price: String,

        /// "All", "1 BHK", "2 BHK", "3 BHK", "1 Bed", "2 Bed" or "3 Bed"
        #[arg(long, default_value = "All")]
        property_type: Selector<PropertyType>,

        /// "All", "Bachelor", "Family", "Girls" or "Working"
        #[arg(long, default_value = "All")]
        tenant: Selector<TenantPreference>,
    },

    /// List your own rooms, including unavailable ones
    Mine,

    /// Add a new room listing
    Add {
        #[arg(long)]
        title: String,

        #[arg(long)]
        description: String,

        /// Complete address
        #[arg(long)]
        location: String,

        #[arg(long)]
        city: String,

        /// Monthly rent
        #[arg(long)]
        rent: u32,

        #[arg(long, default_value = "1 BHK")]
        property_type: PropertyType,

        #[arg(long, default_value = "Bachelor")]
        tenant: TenantPreference,

        /// Defaults to the name on your account
        #[arg(long)]
        owner_name: Option<String>,

        /// Contact phone number
        #[arg(long)]
        contact: String,

        /// Defaults to your account email
        #[arg(long)]
        email: Option<String>,

        /// Photo of the room
        #[arg(long)]
        image: Option<PathBuf>,
    },

    /// Mark one of your rooms available or unavailable
    Toggle {
        id: String,
    },

    /// Permanently delete one of your rooms
    Delete {
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,

        /// Prompted for when omitted
        #[arg(long, env = "ROOMFINDER_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Create an account
    Signup {
        #[arg(long)]
        email: String,

        #[arg(long)]
        name: String,

        #[arg(long, env = "ROOMFINDER_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign out and forget the saved session
    Logout,

    /// Show who is signed in
    Whoami,
}

impl Commands {
    fn operation(&self) -> Operation {
        match self {
            Commands::Browse { .. } | Commands::Mine => Operation::FetchRooms,
            Commands::Whoami => Operation::CheckSession,
            Commands::Add { .. } => Operation::AddRoom,
            Commands::Toggle { .. } => Operation::UpdateRoom,
            Commands::Delete { .. } => Operation::DeleteRoom,
            Commands::Login { .. } => Operation::SignIn,
            Commands::Signup { .. } => Operation::SignUp,
            Commands::Logout => Operation::SignOut,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let operation = cli.command.operation();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            match err.downcast_ref::<Error>() {
                Some(Error::NotSignedIn) => eprintln!("Please sign in first: room-finder login --email <you>"),
                Some(Error::NotConfirmed(_)) => eprintln!("Deletion cancelled."),
                Some(Error::Validation(msg)) => eprintln!("{}", msg),
                _ => eprintln!("{}", operation.failure_message()),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let backend: Arc<dyn Backend> = if cli.offline {
        Arc::new(MemoryBackend::with_sample_data())
    } else {
        Arc::new(SupabaseBackend::new(config.supabase_options()?)?)
    };
    info!("Using {} backend", backend.backend_name());

    let market = Marketplace::new(backend);
    let store = SessionStore::for_backend(&config.session_file, cli.offline);
    let session = store.load().await.context("Failed to read saved session")?;

    match cli.command {
        Commands::Browse {
            search,
            city,
            min_price,
            max_price,
            property_type,
            tenant,
        } => {
            let criteria = FilterCriteria {
                search,
                city,
                min_price,
                max_price,
                property_type,
                tenant_preference: tenant,
            };
            let rooms = market.browse(&criteria).await?;

            if rooms.is_empty() {
                println!("No rooms found matching your criteria.");
                println!("Try adjusting your filters.");
            } else {
                println!("Available Rooms ({})\n", rooms.len());
                print_listings(&rooms, false);
            }
        }

        Commands::Mine => {
            let rooms = market.my_listings(session.as_ref()).await?;
            if rooms.is_empty() {
                println!("You haven't added any listings yet.");
                println!("Run `room-finder add` to create your first listing.");
            } else {
                println!("My Listings ({})\n", rooms.len());
                print_listings(&rooms, true);
            }
        }

        Commands::Add {
            title,
            description,
            location,
            city,
            rent,
            property_type,
            tenant,
            owner_name,
            contact,
            email,
            image,
        } => {
            let signed_in = session.as_ref().ok_or(Error::NotSignedIn)?;
            let defaults = NewListing::for_user(&signed_in.user);

            let form = NewListing {
                title,
                description,
                location,
                city,
                rent_price: rent,
                property_type,
                tenant_preference: tenant,
                owner_name: owner_name.unwrap_or(defaults.owner_name),
                owner_contact: contact,
                owner_email: email.unwrap_or(defaults.owner_email),
            };

            let upload = match image {
                Some(path) => Some(read_image(&path).await?),
                None => None,
            };

            let listing = market.create_listing(session.as_ref(), form, upload).await?;
            println!("Added listing {}", listing.id);
            print_listings(std::slice::from_ref(&listing), true);
        }

        Commands::Toggle { id } => {
            let mine = market.my_listings(session.as_ref()).await?;
            let listing = mine
                .iter()
                .find(|l| l.id == id)
                .ok_or_else(|| Error::NotFound(id.clone()))?;

            let updated = market.toggle_availability(session.as_ref(), listing).await?;
            println!(
                "{} is now {}",
                updated.title,
                if updated.is_available { "Available" } else { "Not Available" }
            );
        }

        Commands::Delete { id, yes } => {
            market
                .delete_listing(session.as_ref(), &id, |_| {
                    yes || confirmed(
                        Confirm::new()
                            .with_prompt("Are you sure you want to delete this listing?")
                            .default(false)
                            .interact(),
                    )
                })
                .await?;
            println!("Deleted listing {}", id);
        }

        Commands::Login { email, password } => {
            let password = password_or_prompt(password)?;
            let session = market.sign_in(&email, &password).await?;
            store.save(&session).await?;
            println!("Signed in as {}", describe(&session));
        }

        Commands::Signup {
            email,
            name,
            password,
        } => {
            let password = password_or_prompt(password)?;
            match market.sign_up(&email, &password, &name).await? {
                Some(session) => {
                    store.save(&session).await?;
                    println!("Account created. Signed in as {}", describe(&session));
                }
                None => println!("Account created. Check {} to confirm it, then log in.", email),
            }
        }

        Commands::Logout => {
            if let Some(session) = &session {
                market.sign_out(session).await?;
            }
            store.clear().await?;
            println!("Signed out.");
        }

        Commands::Whoami => match session {
            Some(session) => {
                let user = market.current_user(Some(&session)).await?;
                println!(
                    "{} <{}>",
                    user.display_name().unwrap_or("(no name)"),
                    user.email.as_deref().unwrap_or("no email")
                );
            }
            None => println!("Not signed in."),
        },
    }

    Ok(())
}

fn password_or_prompt(password: Option<String>) -> anyhow::Result<String> {
    match password {
        Some(password) => Ok(password),
        None => Password::new()
            .with_prompt("Password")
            .interact()
            .context("Failed to read password"),
    }
}

async fn read_image(path: &Path) -> anyhow::Result<ImageUpload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("{} is not a file", path.display()))?;
    Ok(ImageUpload::new(file_name, bytes))
}

/// Prompt answer; a prompt that could not be shown counts as a refusal
fn confirmed(answer: dialoguer::Result<bool>) -> bool {
    match answer {
        Ok(answer) => answer,
        Err(e) => {
            warn!("Could not show confirmation prompt: {}", e);
            false
        }
    }
}

fn describe(session: &Session) -> String {
    match (&session.user.user_metadata.name, &session.user.email) {
        (Some(name), Some(email)) => format!("{} <{}>", name, email),
        (None, Some(email)) => email.clone(),
        _ => session.user.id.clone(),
    }
}

fn print_listings(listings: &[Listing], show_status: bool) {
    for (i, room) in listings.iter().enumerate() {
        println!("{}. {} ({})", i + 1, room.title, room.display_rent());
        println!("   {}, {}", room.location, room.city);
        println!("   {} · {}", room.property_type, room.tenant_preference);
        if show_status {
            println!(
                "   Status: {}",
                if room.is_available { "Available" } else { "Not Available" }
            );
        }
        println!("   {}", room.description);
        println!(
            "   Owner: {} · {} · {}",
            room.owner_name, room.owner_contact, room.owner_email
        );
        println!("   Image: {}", room.display_image());
        println!("   ID: {}", room.id);
        println!();
    }
}

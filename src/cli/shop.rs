use clap::{Args, Subcommand};

use kamehouse_storefront::domain::aggregates::{ProductId, ProfileUpdate, Signup};
use kamehouse_storefront::gateway::{BlogGateway, CatalogGateway, ProductQuery};
use kamehouse_storefront::services::{CartStore, CheckoutFlow, CheckoutForm};
use kamehouse_storefront::{Result, StorefrontError};

use super::Context;

#[derive(Debug, Subcommand)]
pub(crate) enum ShopCommand {
    /// Sign in
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "KAMEHOUSE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in
    Signup(SignupArgs),
    /// Sign out and forget the session
    Logout,
    /// Show the signed-in user
    Whoami {
        /// Reload the user from the backend first
        #[arg(long)]
        refresh: bool,
    },
    /// Edit your profile
    Profile(ProfileArgs),
    /// Browse the catalog
    Catalog {
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 12)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Manage the cart
    #[command(subcommand)]
    Cart(CartCommand),
    /// Place the cart as an order
    Checkout(CheckoutArgs),
    /// Read the store blog
    Blog {
        /// Show a single post
        id: Option<i64>,
    },
}

#[derive(Debug, Args)]
pub(crate) struct SignupArgs {
    #[arg(long)]
    email: String,
    #[arg(long, env = "KAMEHOUSE_PASSWORD", hide_env_values = true)]
    password: String,
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long, default_value = "")]
    address: String,
    #[arg(long, default_value = "")]
    phone: String,
}

#[derive(Debug, Args)]
pub(crate) struct ProfileArgs {
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    address: Option<String>,
}

#[derive(Debug, Subcommand)]
pub(crate) enum CartCommand {
    Show,
    /// Add a catalog product
    Add {
        product_id: ProductId,
        #[arg(long, default_value_t = 1)]
        qty: u32,
    },
    Remove { product_id: ProductId },
    /// Set a line's quantity; 0 removes it
    Set { product_id: ProductId, qty: u32 },
    Clear,
}

#[derive(Args)]
pub(crate) struct CheckoutArgs {
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long, env = "KAMEHOUSE_CARD_NUMBER", hide_env_values = true)]
    card: String,
    /// MM/YY
    #[arg(long)]
    expiry: String,
    #[arg(long, env = "KAMEHOUSE_CARD_CVV", hide_env_values = true)]
    cvv: String,
    #[arg(long)]
    address: String,
}

impl std::fmt::Debug for CheckoutArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutArgs").finish_non_exhaustive()
    }
}

pub(crate) async fn run(command: ShopCommand, ctx: &mut Context) -> Result<()> {
    match command {
        ShopCommand::Login { email, password } => {
            let session = ctx.sessions.login(&email, &password).await?;
            println!("Welcome, {} ({}).", display_name(&session.user.full_name(), &session.user.email), session.user.role.as_str());
        }
        ShopCommand::Signup(args) => {
            let details = Signup {
                email: args.email, password: args.password, first_name: args.first_name,
                last_name: args.last_name, shipping_address: args.address, phone: args.phone,
            };
            let session = ctx.sessions.signup(&details).await?;
            println!("Account created for {}.", session.user.email);
        }
        ShopCommand::Logout => {
            ctx.sessions.logout().await?;
            println!("Signed out.");
        }
        ShopCommand::Whoami { refresh } => {
            if refresh && ctx.sessions.is_signed_in() {
                ctx.sessions.fetch_current_user().await?;
            }
            whoami(ctx);
        }
        ShopCommand::Profile(args) => {
            let update = ProfileUpdate { first_name: args.first_name, last_name: args.last_name, phone: args.phone, shipping_address: args.address };
            let user = ctx.sessions.update_profile(update).await?;
            println!("Profile saved for {}.", user.email);
        }
        ShopCommand::Catalog { search, limit, offset } => {
            let products = ctx.gateway.list_products(&ProductQuery { limit, offset, search }, &ctx.token()).await?;
            for p in products {
                let availability = if p.is_in_stock() { format!("{} in stock", p.stock) } else { "sold out".to_string() };
                println!("#{:<5} {:<40} {:>10}  {}", p.id, p.name, p.price, availability);
            }
        }
        ShopCommand::Cart(command) => cart(command, ctx).await?,
        ShopCommand::Checkout(args) => {
            let form = CheckoutForm {
                first_name: args.first_name, last_name: args.last_name, card_number: args.card,
                expiry: args.expiry, cvv: args.cvv, address: args.address,
            };
            let mut cart = ctx.cart();
            let mut flow = CheckoutFlow::new(ctx.gateway.clone(), ctx.config.confirmation_delay);
            let total = cart.total();
            let order_id = flow.submit(&mut cart, &ctx.sessions, &form).await?;
            println!("Order #{order_id} placed for {total}. Thank you!");
        }
        ShopCommand::Blog { id: Some(id) } => {
            let post = ctx.gateway.get_post(id).await?;
            println!("{}\n\n{}", post.title, post.body);
        }
        ShopCommand::Blog { id: None } => {
            for post in ctx.gateway.list_posts().await? {
                println!("#{:<5} {}  {}", post.id, post.title, post.excerpt);
            }
        }
    }
    Ok(())
}

async fn cart(command: CartCommand, ctx: &Context) -> Result<()> {
    let mut cart = ctx.cart();
    match command {
        CartCommand::Show => {}
        CartCommand::Add { product_id, qty } => {
            let products = ctx.gateway.list_products(&ProductQuery::first(ctx.config.admin_product_limit), &ctx.token()).await?;
            let product = products.into_iter().find(|p| p.id == product_id).ok_or_else(|| StorefrontError::product_not_found(product_id))?;
            let quantity = cart.add_to_cart(&product, qty)?;
            println!("{} x{} in cart.", product.name, quantity);
        }
        CartCommand::Remove { product_id } => {
            if !cart.remove_from_cart(product_id)? { println!("Product {product_id} was not in the cart."); }
        }
        CartCommand::Set { product_id, qty } => {
            cart.update_quantity(product_id, qty)?;
        }
        CartCommand::Clear => cart.clear_cart()?,
    }
    print_cart(&cart);
    Ok(())
}

fn print_cart(cart: &CartStore) {
    if cart.is_empty() {
        println!("Your cart is empty.");
        return;
    }
    for line in cart.lines() {
        println!("#{:<5} {:<40} {:>3} x {:>10} = {:>10}", line.product_id, line.name, line.quantity, line.unit_price, line.line_total());
    }
    println!("{} item(s), total {}", cart.count(), cart.total());
}

fn whoami(ctx: &Context) {
    match ctx.sessions.session() {
        Some(session) => {
            let user = &session.user;
            println!("{} <{}>", display_name(&user.full_name(), &user.email), user.email);
            println!("role: {}  phone: {}  address: {}", user.role.as_str(), user.phone, user.shipping_address);
            println!("session expires {}", session.expires_at.to_rfc3339());
        }
        None => println!("Not signed in."),
    }
}

fn display_name<'a>(full_name: &'a str, email: &'a str) -> &'a str {
    if full_name.is_empty() { email } else { full_name }
}

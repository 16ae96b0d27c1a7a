use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};
use rust_decimal::Decimal;

use kamehouse_storefront::domain::aggregates::{
    BlockPatch, BlogPostDraft, NewUser, OrderId, OrderStatus, ProductDraft, ProductId, Role, Signup, UserId, UserPatch,
};
use kamehouse_storefront::domain::value_objects::Money;
use kamehouse_storefront::gateway::{BlogGateway, CatalogGateway, OrderGateway, UserGateway};
use kamehouse_storefront::services::fulfillment::{FulfillmentOutcome, StockFailureReason};
use kamehouse_storefront::services::OrderFulfillment;
use kamehouse_storefront::{Result, StorefrontError};

use super::Context;

#[derive(Debug, Args)]
pub(crate) struct AdminCommand {
    #[command(subcommand)]
    command: AdminSubcommand,
}

#[derive(Debug, Subcommand)]
enum AdminSubcommand {
    /// List orders
    Orders {
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
    },
    /// Ship a pending order and take its items out of stock
    Confirm { order_id: OrderId },
    /// Cancel a pending order and put its items back in stock
    Reject { order_id: OrderId },
    #[command(subcommand)]
    Product(ProductCommand),
    #[command(subcommand)]
    User(UserCommand),
    #[command(subcommand)]
    Blog(BlogCommand),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StatusArg {
    Pending,
    Shipped,
    Cancelled,
}

impl From<StatusArg> for OrderStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Pending => Self::Pending,
            StatusArg::Shipped => Self::Shipped,
            StatusArg::Cancelled => Self::Cancelled,
        }
    }
}

#[derive(Debug, Subcommand)]
enum ProductCommand {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        price: Decimal,
        #[arg(long, default_value_t = 0)]
        stock: u32,
        #[arg(long, default_value = "")]
        genre: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Image to upload and attach
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Overwrite the stock counter
    Stock { product_id: ProductId, stock: u32 },
    Delete { product_id: ProductId },
}

#[derive(Debug, Subcommand)]
enum UserCommand {
    List,
    Create {
        #[arg(long)]
        email: String,
        #[arg(long, env = "KAMEHOUSE_NEW_USER_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        #[arg(long)]
        admin: bool,
    },
    Update {
        user_id: UserId,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "")]
        address: String,
        #[arg(long)]
        admin: Option<bool>,
    },
    Block { user_id: UserId },
    Unblock { user_id: UserId },
    Delete { user_id: UserId },
}

#[derive(Debug, Subcommand)]
enum BlogCommand {
    /// All posts, published or not
    List,
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        body: String,
        #[arg(long)]
        excerpt: Option<String>,
        #[arg(long)]
        section: Option<String>,
        #[arg(long)]
        draft: bool,
    },
    /// Replace a post's title and body
    Edit {
        post_id: i64,
        #[arg(long)]
        title: String,
        #[arg(long)]
        body: String,
        #[arg(long)]
        excerpt: Option<String>,
    },
    Publish { post_id: i64 },
    Unpublish { post_id: i64 },
    Delete { post_id: i64 },
}

pub(crate) async fn run(command: AdminCommand, ctx: &mut Context) -> Result<()> {
    let (admin_id, token) = ctx.admin()?;
    let gateway = ctx.gateway.clone();

    match command.command {
        AdminSubcommand::Orders { status } => {
            for order in gateway.list_orders(status.map(OrderStatus::from), &token).await? {
                let email = order.user_email.as_deref().unwrap_or("-");
                println!("#{:<6} {:<10} {:>4} item(s) {:>10}  {}", order.id, order.status, order.item_count(), order.total, email);
            }
        }
        AdminSubcommand::Confirm { order_id } => {
            let outcome = fulfillment(ctx).confirm_order(order_id, admin_id, &token).await;
            report(outcome)?;
        }
        AdminSubcommand::Reject { order_id } => {
            let outcome = fulfillment(ctx).reject_order(order_id, &token).await;
            report(outcome)?;
        }
        AdminSubcommand::Product(ProductCommand::Create { name, price, stock, genre, description, image }) => {
            let image = match image {
                Some(path) => {
                    let bytes = tokio::fs::read(&path).await.map_err(|e| StorefrontError::Storage(e.into()))?;
                    let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "image".to_string());
                    gateway.upload_image(&file_name, bytes).await?
                }
                None => Vec::new(),
            };
            let draft = ProductDraft { name, price: Money::new(price), stock, descripcion: description, genero: genre, image };
            let product = gateway.create_product(&draft, &token).await?;
            println!("Created product #{} {}.", product.id, product.name);
        }
        AdminSubcommand::Product(ProductCommand::Stock { product_id, stock }) => {
            let product = gateway.update_stock(product_id, stock, &token).await?;
            println!("{} now has {} in stock.", product.name, product.stock);
        }
        AdminSubcommand::Product(ProductCommand::Delete { product_id }) => {
            gateway.delete_product(product_id, &token).await?;
            println!("Deleted product #{product_id}.");
        }
        AdminSubcommand::User(command) => user(command, ctx, &token).await?,
        AdminSubcommand::Blog(command) => blog(command, ctx, &token).await?,
    }
    Ok(())
}

fn fulfillment(ctx: &Context) -> OrderFulfillment {
    OrderFulfillment::new(ctx.gateway.clone(), ctx.gateway.clone())
        .with_policy(ctx.config.fulfillment_policy)
        .with_product_limit(ctx.config.admin_product_limit)
}

fn report(outcome: Result<FulfillmentOutcome>) -> Result<()> {
    let (stock_report, result) = match outcome {
        Ok(outcome) => {
            println!("Order #{} is now {}.", outcome.order.id, outcome.order.status);
            (outcome.report, Ok(()))
        }
        Err(StorefrontError::PartialFailure { order_id, report }) => {
            (report.clone(), Err(StorefrontError::PartialFailure { order_id, report }))
        }
        Err(e) => return Err(e),
    };
    for change in &stock_report.succeeded {
        println!("  product #{}: stock {} -> {}", change.product_id, change.from, change.to);
    }
    for failure in &stock_report.failed {
        let reason = match &failure.reason {
            StockFailureReason::ProductMissing => "product not found".to_string(),
            StockFailureReason::WriteFailed { status, .. } => format!("update failed ({})", status.map_or_else(|| "network".to_string(), |s| s.to_string())),
        };
        println!("  product #{}: {reason}", failure.product_id);
    }
    result
}

async fn user(command: UserCommand, ctx: &Context, token: &str) -> Result<()> {
    let gateway = &ctx.gateway;
    match command {
        UserCommand::List => {
            for user in gateway.list_users(token).await?.into_iter().map(|u| u.normalize()) {
                let blocked = if user.blocked { "blocked" } else { "" };
                println!("#{:<5} {:<30} {:<8} {}", user.id, user.email, user.role.as_str(), blocked);
            }
        }
        UserCommand::Create { email, password, first_name, last_name, admin } => {
            let role = if admin { Role::Admin } else { Role::Customer };
            let details = Signup { email, password, first_name, last_name, ..Signup::default() };
            gateway.create_user(&NewUser::new(details, role), token).await?;
            println!("User created.");
        }
        UserCommand::Update { user_id, email, first_name, last_name, phone, address, admin } => {
            let mut patch = UserPatch::default().email(&email).first_name(&first_name).last_name(&last_name).phone(&phone).shipping_address(&address);
            if let Some(admin) = admin { patch = patch.role(if admin { Role::Admin } else { Role::Customer }); }
            gateway.update_user(user_id, &patch, token).await?;
            println!("User #{user_id} saved.");
        }
        UserCommand::Block { user_id } => set_blocked(ctx, user_id, true, token).await?,
        UserCommand::Unblock { user_id } => set_blocked(ctx, user_id, false, token).await?,
        UserCommand::Delete { user_id } => {
            gateway.delete_user(user_id, token).await?;
            println!("User #{user_id} deleted.");
        }
    }
    Ok(())
}

async fn set_blocked(ctx: &Context, user_id: UserId, blocked: bool, token: &str) -> Result<()> {
    let user = ctx
        .gateway
        .list_users(token)
        .await?
        .into_iter()
        .find(|u| u.id == user_id)
        .map(|u| u.normalize())
        .ok_or(StorefrontError::NotFound { resource: "User", id: user_id })?;
    ctx.gateway.set_blocked(user_id, &BlockPatch::new(&user, blocked), token).await?;
    println!("User #{user_id} {}.", if blocked { "blocked" } else { "unblocked" });
    Ok(())
}

async fn blog(command: BlogCommand, ctx: &Context, token: &str) -> Result<()> {
    let gateway = &ctx.gateway;
    match command {
        BlogCommand::List => {
            for post in gateway.list_all_posts(token).await? {
                let state = if post.published { "published" } else { "draft" };
                println!("#{:<5} {:<10} {}", post.id, state, post.title);
            }
        }
        BlogCommand::Create { title, body, excerpt, section, draft } => {
            let payload = BlogPostDraft { title, body: Some(body), excerpt, section, published: Some(!draft), ..BlogPostDraft::default() }.into_payload();
            let post = gateway.create_post(&payload, token).await?;
            println!("Created post #{} ({}).", post.id, post.slug);
        }
        BlogCommand::Edit { post_id, title, body, excerpt } => {
            let current = gateway.get_post(post_id).await?;
            let draft = BlogPostDraft {
                title,
                slug: None,
                section: Some(current.section),
                tag: Some(current.tag),
                excerpt: excerpt.or(Some(current.excerpt)),
                body: Some(body),
                published: Some(current.published),
                cover_image: current.cover_image,
                gallery: current.gallery,
            };
            let post = gateway.update_post(post_id, &draft.into_payload(), token).await?;
            println!("Saved post #{} ({}).", post.id, post.slug);
        }
        BlogCommand::Publish { post_id } => {
            gateway.set_published(post_id, true, token).await?;
            println!("Post #{post_id} published.");
        }
        BlogCommand::Unpublish { post_id } => {
            gateway.set_published(post_id, false, token).await?;
            println!("Post #{post_id} unpublished.");
        }
        BlogCommand::Delete { post_id } => {
            gateway.delete_post(post_id, token).await?;
            println!("Post #{post_id} deleted.");
        }
    }
    Ok(())
}

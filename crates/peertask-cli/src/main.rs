// ============================================================================
// peertask - command-line client for the PeerTask marketplace
// ============================================================================
// Usage:
//   peertask login --email E --password P      Sign in and remember the session
//   peertask refresh                           Fetch tasks into the local snapshot
//   peertask browse [--search T] [--category C] Tasks you can apply to
//   peertask apply TASK --cover-letter TEXT    Apply to an open task
//   peertask history --view assigned           Tasks you created/applied/got
//   peertask chat USER_ID                      Open a conversation
//   peertask watch CONVERSATION_ID             Stream new messages
//   peertask --offline ...                     Use the in-process backend
// ============================================================================

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn};

use peertask_core::{
    messaging::filter_conversations, BlogClient, BrowseCriteria, ConversationDirectory,
    HistoryView, HttpBackend, InMemoryBackend, MarketplaceBackend, MessageSubscription,
    MessageThread, NewBlogPost, NewTask, PeerTaskConfig, PeerTaskDb, ProfileUpdate, Session,
    SessionManager, Task, TaskEngine, TaskStatus,
};

/// PeerTask marketplace client
#[derive(Parser)]
#[command(name = "peertask", version, about = "Browse, apply to and manage PeerTask tasks")]
struct Cli {
    /// Path to the database file (default: ~/.peertask/peertask.redb)
    #[arg(long, global = true)]
    db_path: Option<String>,

    /// Work against an in-process backend seeded from the local snapshot
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and sign in
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Sign in with an existing account
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Forget the stored session
    Logout,

    /// Show the signed-in profile
    Whoami,

    /// Update profile details
    Profile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        /// Comma-separated skills
        #[arg(long)]
        skills: Option<String>,
        #[arg(long)]
        avatar: Option<String>,
    },

    /// Fetch tasks from the backend into the local snapshot
    Refresh,

    /// List tasks you can apply to
    Browse {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        min_budget: Option<f64>,
        #[arg(long)]
        max_budget: Option<f64>,
    },

    /// List the categories present in the snapshot
    Categories,

    /// Show one task in full
    Show { task_id: String },

    /// Post a new task
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        budget: f64,
        /// RFC 3339 timestamp or YYYY-MM-DD (end of that day, UTC)
        #[arg(long)]
        deadline: String,
        #[arg(long)]
        category: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
        #[arg(long)]
        requirements: Option<String>,
    },

    /// Apply to an open task
    Apply {
        task_id: String,
        #[arg(long)]
        cover_letter: String,
    },

    /// Assign one of your task's applicants
    Assign { task_id: String, applicant_id: String },

    /// Mark a task assigned to you as completed
    Complete { task_id: String },

    /// Pay for one of your completed tasks
    Pay { task_id: String },

    /// Tasks you created, were assigned, or applied to
    History {
        /// created, assigned or applied
        #[arg(long, default_value = "created")]
        view: String,
        /// open, assigned or completed
        #[arg(long)]
        status: Option<String>,
    },

    /// List your conversations
    Conversations {
        /// Match on the other participant's name
        #[arg(long)]
        search: Option<String>,
    },

    /// Open (or create) the conversation with another user and show it
    Chat {
        user_id: String,
        /// Load messages older than the current page too
        #[arg(long)]
        older: bool,
    },

    /// Send a message to another user
    Send {
        user_id: String,
        message: String,
    },

    /// Stream new messages of a conversation until Ctrl-C
    Watch {
        conversation_id: String,
        #[arg(long)]
        interval_secs: Option<u64>,
    },

    /// Community blog
    Blog {
        #[command(subcommand)]
        command: BlogCommands,
    },

    /// Show local database statistics
    Stats,

    /// Export the local snapshot as JSON
    Export,
}

#[derive(Subcommand)]
enum BlogCommands {
    /// List approved posts
    List,

    /// Submit a post for review
    Submit {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        #[arg(long)]
        author: String,
    },
}

struct App {
    db: PeerTaskDb,
    config: PeerTaskConfig,
    backend: Arc<dyn MarketplaceBackend>,
    sessions: SessionManager,
    engine: TaskEngine,
}

impl App {
    async fn open(cli: &Cli, config: PeerTaskConfig) -> Result<Self> {
        let db_path = cli.db_path.as_deref().or(config.db_path.as_deref());
        let db = PeerTaskDb::open(db_path)?;
        let snapshot = db.list_tasks()?;

        let backend: Arc<dyn MarketplaceBackend> = if cli.offline {
            info!("Offline mode: in-process backend with {} tasks", snapshot.len());
            Arc::new(
                InMemoryBackend::seeded(snapshot.clone())
                    .with_policy(config.rejection_policy)
                    .trusting(),
            )
        } else {
            Arc::new(HttpBackend::new(config.api_url.clone()))
        };

        let sessions = SessionManager::new(Arc::clone(&backend));
        if let Some(stored) = db.get_session()? {
            sessions.restore(stored.session).await;
        }

        let engine = TaskEngine::with_retry(Arc::clone(&backend), config.retry.clone());
        engine.restore(snapshot).await;

        Ok(Self {
            db,
            config,
            backend,
            sessions,
            engine,
        })
    }

    async fn session(&self) -> Result<Session> {
        self.sessions
            .require()
            .await
            .context("Sign in first with `peertask login`")
    }

    fn directory(&self) -> ConversationDirectory {
        ConversationDirectory::with_retry(Arc::clone(&self.backend), self.config.retry.clone())
    }

    async fn save_snapshot(&self) -> Result<()> {
        self.db.store_tasks(&self.engine.snapshot().await)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: Could not load .env file: {}", e);
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("peertask=info".parse()?)
                .add_directive("peertask_core=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = PeerTaskConfig::from_env();
    let app = App::open(&cli, config).await?;

    match cli.command {
        Commands::Register {
            name,
            email,
            password,
        } => cmd_register(&app, &name, &email, &password).await,
        Commands::Login { email, password } => cmd_login(&app, &email, &password).await,
        Commands::Logout => cmd_logout(&app).await,
        Commands::Whoami => cmd_whoami(&app).await,
        Commands::Profile {
            name,
            bio,
            skills,
            avatar,
        } => {
            let update = ProfileUpdate {
                full_name: name,
                bio,
                skills: skills.as_deref().map(split_list),
                avatar,
            };
            cmd_profile(&app, &update).await
        }
        Commands::Refresh => cmd_refresh(&app).await,
        Commands::Browse {
            search,
            category,
            min_budget,
            max_budget,
        } => {
            let mut criteria = BrowseCriteria::new();
            if let Some(term) = search {
                criteria = criteria.with_search(term);
            }
            if let Some(category) = category {
                criteria = criteria.with_category(category);
            }
            if let Some(min) = min_budget {
                criteria = criteria.with_min_budget(min);
            }
            if let Some(max) = max_budget {
                criteria = criteria.with_max_budget(max);
            }
            cmd_browse(&app, &criteria).await
        }
        Commands::Categories => cmd_categories(&app).await,
        Commands::Show { task_id } => cmd_show(&app, &task_id).await,
        Commands::Create {
            title,
            description,
            budget,
            deadline,
            category,
            tags,
            requirements,
        } => {
            let new_task = NewTask {
                title,
                description,
                requirements,
                budget,
                deadline: parse_deadline(&deadline)?,
                category,
                tags: tags.as_deref().map(split_list).unwrap_or_default(),
            };
            cmd_create(&app, new_task).await
        }
        Commands::Apply {
            task_id,
            cover_letter,
        } => {
            let session = app.session().await?;
            let task = app.engine.apply(&session, &task_id, &cover_letter).await?;
            println!("Applied to '{}' ({} applicants)", task.title, task.applicants.len());
            app.save_snapshot().await
        }
        Commands::Assign {
            task_id,
            applicant_id,
        } => {
            let session = app.session().await?;
            let task = app.engine.assign(&session, &task_id, &applicant_id).await?;
            println!("Assigned '{}' to {}", task.title, applicant_id);
            app.save_snapshot().await
        }
        Commands::Complete { task_id } => {
            let session = app.session().await?;
            let task = app.engine.complete(&session, &task_id).await?;
            println!("Completed '{}'; payment is pending", task.title);
            app.save_snapshot().await
        }
        Commands::Pay { task_id } => {
            let session = app.session().await?;
            let task = app.engine.pay(&session, &task_id).await?;
            println!("Paid {:.2} for '{}'", task.budget, task.title);
            app.save_snapshot().await
        }
        Commands::History { view, status } => cmd_history(&app, &view, status.as_deref()).await,
        Commands::Conversations { search } => cmd_conversations(&app, search.as_deref()).await,
        Commands::Chat { user_id, older } => cmd_chat(&app, &user_id, older).await,
        Commands::Send { user_id, message } => cmd_send(&app, &user_id, &message).await,
        Commands::Watch {
            conversation_id,
            interval_secs,
        } => cmd_watch(&app, &conversation_id, interval_secs).await,
        Commands::Blog { command } => cmd_blog(&app, command).await,
        Commands::Stats => cmd_stats(&app),
        Commands::Export => cmd_export(&app),
    }
}

// ============================================================================
// Parsing & formatting helpers
// ============================================================================

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// RFC 3339, or a bare date meaning the last second of that day (UTC)
fn parse_deadline(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid deadline '{}': use YYYY-MM-DD or RFC 3339", s))?;
    let end_of_day = date
        .and_hms_opt(23, 59, 59)
        .with_context(|| format!("Invalid deadline '{}'", s))?;
    Ok(end_of_day.and_utc())
}

fn parse_status(s: &str) -> Result<TaskStatus> {
    match TaskStatus::parse(s) {
        Some(status) => Ok(status),
        None => bail!("Unknown status '{}'. Valid values: open, assigned, completed", s),
    }
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Human-friendly time until `deadline`
fn format_remaining(deadline: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let left = deadline - now;
    if left < Duration::zero() {
        "expired".to_string()
    } else if left.num_days() > 0 {
        format!("{}d left", left.num_days())
    } else if left.num_hours() > 0 {
        format!("{}h left", left.num_hours())
    } else {
        format!("{}m left", left.num_minutes().max(1))
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

fn print_task_table(tasks: &[Task], now: DateTime<Utc>) {
    println!(
        "{:<36}  {:<30}  {:>9}  {:<14}  {:<10}  {}",
        "TASK ID", "TITLE", "BUDGET", "CATEGORY", "STATUS", "DEADLINE"
    );
    println!("{}", "-".repeat(118));

    for task in tasks {
        println!(
            "{:<36}  {:<30}  {:>9.2}  {:<14}  {:<10}  {}",
            task.id,
            truncate(&task.title, 30),
            task.budget,
            truncate(task.category.as_deref().unwrap_or("-"), 14),
            task.status.as_str(),
            format_remaining(task.deadline, now)
        );
    }
}

// ============================================================================
// Account commands
// ============================================================================

async fn cmd_register(app: &App, name: &str, email: &str, password: &str) -> Result<()> {
    let session = app.sessions.register(name, email, password).await?;
    app.db.store_session(&session)?;
    println!("Welcome, {}! Signed in as {}", session.user.full_name, session.user.email);
    Ok(())
}

async fn cmd_login(app: &App, email: &str, password: &str) -> Result<()> {
    let session = app.sessions.login(email, password).await?;
    app.db.store_session(&session)?;
    println!("Signed in as {} ({})", session.user.full_name, session.user.email);
    Ok(())
}

async fn cmd_logout(app: &App) -> Result<()> {
    let had_session = app.sessions.logout().await.is_some();
    let had_stored = app.db.clear_session()?;
    if had_session || had_stored {
        println!("Signed out.");
    } else {
        println!("Not signed in.");
    }
    Ok(())
}

async fn cmd_whoami(app: &App) -> Result<()> {
    match app.sessions.current().await {
        Some(session) => {
            let user = &session.user;
            println!("Name:   {}", user.full_name);
            println!("Email:  {}", user.email);
            println!("ID:     {}", user.id);
            if let Some(bio) = &user.bio {
                println!("Bio:    {}", bio);
            }
            if !user.skills.is_empty() {
                println!("Skills: {}", user.skills.join(", "));
            }
        }
        None => println!("Not signed in."),
    }
    Ok(())
}

async fn cmd_profile(app: &App, update: &ProfileUpdate) -> Result<()> {
    let session = app.sessions.update_details(update).await?;
    app.db.store_session(&session)?;
    println!("Profile updated for {}", session.user.full_name);
    Ok(())
}

// ============================================================================
// Task commands
// ============================================================================

async fn cmd_refresh(app: &App) -> Result<()> {
    let session = app.session().await?;
    let count = app.engine.refresh(&session).await?;
    app.save_snapshot().await?;
    println!("Fetched {} tasks.", count);
    Ok(())
}

async fn cmd_browse(app: &App, criteria: &BrowseCriteria) -> Result<()> {
    let session = app.session().await?;
    let now = Utc::now();
    let tasks = app.engine.browse(&session, criteria, now).await;

    if tasks.is_empty() {
        if app.engine.snapshot().await.is_empty() {
            println!("No tasks cached. Run `peertask refresh` first.");
        } else {
            println!("No tasks match.");
        }
        return Ok(());
    }

    print_task_table(&tasks, now);
    println!("\nTotal: {} tasks", tasks.len());
    Ok(())
}

async fn cmd_categories(app: &App) -> Result<()> {
    let categories = app.engine.categories().await;
    if categories.is_empty() {
        println!("No categories found.");
    }
    for category in categories {
        println!("{}", category);
    }
    Ok(())
}

async fn cmd_show(app: &App, task_id: &str) -> Result<()> {
    let task = app.engine.task(task_id).await?;
    let now = Utc::now();

    println!("=== {} ===", task.title);
    println!("ID:        {}", task.id);
    println!("Status:    {}", task.status);
    if let Some(payment) = task.payment_status {
        println!("Payment:   {:?}", payment);
    }
    println!("Budget:    {:.2}", task.budget);
    println!(
        "Deadline:  {} ({})",
        format_timestamp(task.deadline),
        format_remaining(task.deadline, now)
    );
    println!("Category:  {}", task.category.as_deref().unwrap_or("-"));
    if !task.tags.is_empty() {
        println!("Tags:      {}", task.tags.join(", "));
    }
    println!("Posted by: {} on {}", task.created_by, format_timestamp(task.created_at));
    if let Some(assignee) = &task.assigned_to {
        println!("Assignee:  {}", assignee);
    }
    println!();
    println!("{}", task.description);
    if let Some(requirements) = &task.requirements {
        println!("\nRequirements:\n{}", requirements);
    }

    if !task.applicants.is_empty() {
        println!("\nApplicants:");
        for application in &task.applicants {
            println!(
                "  - {} ({:?}, {}): {}",
                application.user_id,
                application.status,
                format_timestamp(application.applied_at),
                truncate(&application.cover_letter, 60)
            );
        }
    }
    if !task.attachments.is_empty() {
        println!("\nAttachments:");
        for attachment in &task.attachments {
            println!("  - {} ({})", attachment.name, attachment.size);
        }
    }
    Ok(())
}

async fn cmd_create(app: &App, new_task: NewTask) -> Result<()> {
    let session = app.session().await?;
    let task = app.engine.create_task(&session, new_task).await?;
    app.save_snapshot().await?;
    println!("Created task {} ({})", task.id, task.title);
    Ok(())
}

async fn cmd_history(app: &App, view: &str, status: Option<&str>) -> Result<()> {
    let session = app.session().await?;
    let view = match HistoryView::parse(view) {
        Some(view) => view,
        None => bail!("Unknown view '{}'. Valid values: created, assigned, applied", view),
    };
    let status = status.map(parse_status).transpose()?;

    let tasks = app.engine.history(&session, view, status).await;
    if tasks.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }

    print_task_table(&tasks, Utc::now());
    println!("\nTotal: {} tasks", tasks.len());
    Ok(())
}

// ============================================================================
// Messaging commands
// ============================================================================

async fn cmd_conversations(app: &App, search: Option<&str>) -> Result<()> {
    let session = app.session().await?;
    let directory = app.directory();

    let conversations = directory.conversations(&session).await?;
    let details = match directory.counterpart_details(&session, &conversations).await {
        Ok(details) => details,
        Err(e) => {
            warn!("Could not load participant names: {}", e);
            Vec::new()
        }
    };

    let shown = filter_conversations(&conversations, session.user_id(), &details, search.unwrap_or(""));
    if shown.is_empty() {
        println!("No conversations found.");
        return Ok(());
    }

    println!("{:<36}  {:<24}  {}", "CONVERSATION", "WITH", "LAST ACTIVITY");
    println!("{}", "-".repeat(84));
    for conversation in shown {
        let other = conversation.counterpart(session.user_id());
        let name = details
            .iter()
            .find(|d| d.id == other)
            .map(|d| d.full_name.as_str())
            .unwrap_or(other);
        println!(
            "{:<36}  {:<24}  {}",
            conversation.id,
            truncate(name, 24),
            conversation
                .updated_at
                .map(format_timestamp)
                .unwrap_or_else(|| "-".into())
        );
    }
    Ok(())
}

async fn cmd_chat(app: &App, user_id: &str, older: bool) -> Result<()> {
    let session = app.session().await?;
    let directory = app.directory();
    let conversation = directory.open_with(&session, user_id).await?;

    let mut thread = MessageThread::new(conversation.id.clone());
    thread.merge(directory.load_page(&session, &conversation.id, None).await?);
    if older {
        if let Some(oldest) = thread.oldest().map(|m| m.timestamp) {
            thread.merge(directory.load_page(&session, &conversation.id, Some(oldest)).await?);
        }
    }

    println!("Conversation {} with {}", conversation.id, user_id);
    println!("{}", "-".repeat(60));
    if thread.is_empty() {
        println!("(no messages yet)");
    }
    for message in thread.messages() {
        let who = if message.sender_id == session.user_id() { "you" } else { user_id };
        println!("[{}] {}: {}", format_timestamp(message.timestamp), who, message.content);
    }
    Ok(())
}

async fn cmd_send(app: &App, user_id: &str, content: &str) -> Result<()> {
    let session = app.session().await?;
    let directory = app.directory();
    let conversation = directory.open_with(&session, user_id).await?;
    let message = directory.send(&session, &conversation, content).await?;
    println!("Sent at {}", format_timestamp(message.timestamp));
    Ok(())
}

async fn cmd_watch(app: &App, conversation_id: &str, interval_secs: Option<u64>) -> Result<()> {
    let session = app.session().await?;
    let interval = interval_secs
        .filter(|secs| *secs > 0)
        .map(std::time::Duration::from_secs)
        .unwrap_or(app.config.poll_interval);

    // Messages already on screen are not repeated
    let directory = app.directory();
    let mut thread = MessageThread::new(conversation_id);
    for message in thread.merge(directory.load_page(&session, conversation_id, None).await?) {
        println!("[{}] {}: {}", format_timestamp(message.timestamp), message.sender_id, message.content);
    }

    let viewer = session.user_id().to_string();
    let mut subscription =
        MessageSubscription::start(Arc::clone(&app.backend), session, thread, interval);
    println!("Watching {} (Ctrl-C to stop)...", conversation_id);

    loop {
        let message = tokio::select! {
            message = subscription.next() => message,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(message) = message else { break };
        let who = if message.sender_id == viewer { "you" } else { message.sender_id.as_str() };
        println!("[{}] {}: {}", format_timestamp(message.timestamp), who, message.content);
    }
    subscription.stop();

    println!("Stopped watching.");
    Ok(())
}

// ============================================================================
// Blog & database commands
// ============================================================================

async fn cmd_blog(app: &App, command: BlogCommands) -> Result<()> {
    let client = BlogClient::from_settings(
        app.config.blog_url.as_deref(),
        app.config.blog_key.as_deref(),
    )
    .context("Set PEERTASK_BLOG_URL and PEERTASK_BLOG_KEY")?
    .with_retry(app.config.retry.clone());

    match command {
        BlogCommands::List => {
            let posts = client.approved_posts().await?;
            if posts.is_empty() {
                println!("No posts yet.");
            }
            for post in &posts {
                println!("=== {} ===", post.title);
                println!("by {} on {}", post.author(), format_timestamp(post.created_at));
                println!("{}\n", truncate(&post.content, 280));
            }
        }
        BlogCommands::Submit {
            title,
            content,
            author,
        } => {
            client
                .submit(&NewBlogPost {
                    title,
                    content,
                    author_name: author,
                })
                .await?;
            println!("Submitted. Your post will appear once it has been reviewed.");
        }
    }
    Ok(())
}

fn cmd_stats(app: &App) -> Result<()> {
    let stats = app.db.stats()?;

    println!("=== PeerTask Database Stats ===");
    println!("Database:  {}", app.db.path().display());
    println!();
    println!("Tasks:     {} total", stats.total_tasks);
    for (status, count) in &stats.task_counts {
        println!("  {:12} {}", status, count);
    }
    println!(
        "Snapshot:  {}",
        stats
            .tasks_saved_at
            .map(format_timestamp)
            .unwrap_or_else(|| "never".into())
    );
    println!(
        "Session:   {}",
        stats.signed_in_as.as_deref().unwrap_or("not signed in")
    );

    Ok(())
}

fn cmd_export(app: &App) -> Result<()> {
    let export = serde_json::json!({
        "exported_at": Utc::now().to_rfc3339(),
        "stats": app.db.stats()?,
        "tasks": app.db.list_tasks()?,
    });

    println!("{}", serde_json::to_string_pretty(&export)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_deadline_forms() {
        let date_only = parse_deadline("2030-04-15").unwrap();
        assert_eq!(date_only.day(), 15);
        assert_eq!(date_only.hour(), 23);
        assert_eq!(date_only.second(), 59);

        let full = parse_deadline("2030-04-15T08:30:00+02:00").unwrap();
        assert_eq!(full.hour(), 6);

        assert!(parse_deadline("next friday").is_err());
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("Python, Statistics,, "), vec!["Python", "Statistics"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_format_remaining() {
        let now = Utc::now();
        assert_eq!(format_remaining(now - Duration::minutes(1), now), "expired");
        assert_eq!(format_remaining(now + Duration::days(3), now), "3d left");
        assert_eq!(format_remaining(now + Duration::hours(5), now), "5h left");
        assert_eq!(format_remaining(now + Duration::seconds(10), now), "1m left");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer title", 6), "a lon…");
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("Completed").unwrap(), TaskStatus::Completed);
        assert!(parse_status("cancelled").is_err());
    }
}

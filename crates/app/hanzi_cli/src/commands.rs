//! Command handlers. Each one drives the same controllers a screen would.

use std::path::Path;
use std::sync::Arc;

use hanzi_core::AppConfig;
use hanzi_core::auth::{FileSessionCache, MemorySessionCache, SessionCache, SessionManager};
use hanzi_core::backend::supabase::SupabaseBackend;
use hanzi_core::chat::ChatGateway;
use hanzi_core::controllers::{
    AccountController, ChatController, ImageUploadController, NotificationsController,
    RegisterForm, WordFormController, WordListController,
};
use hanzi_core::images::ImageRepository;
use hanzi_core::models::{Word, WordFilter};
use hanzi_core::notifications::notification_repository;
use hanzi_core::upload::{FileMediaPicker, UploadPipeline};
use hanzi_core::words::WordRepository;
use tracing::warn;

use crate::cli::{ImagesCommand, NotificationsCommand, RegisterArgs, WordsCommand};
use crate::{Error, Result};

/// Backend, session and repositories for commands that talk to the hosted backend.
struct Context {
    config: AppConfig,
    backend: Arc<SupabaseBackend>,
    session: Arc<SessionManager>,
}

impl Context {
    async fn connect(config: AppConfig) -> Result<Self> {
        let backend = Arc::new(SupabaseBackend::from_config(&config)?);
        let cache: Arc<dyn SessionCache> = match &config.session_file {
            Some(path) => Arc::new(FileSessionCache::new(path)),
            None => {
                warn!("no data directory, the session will not be kept");
                Arc::new(MemorySessionCache::new())
            }
        };
        let session = Arc::new(SessionManager::new(backend.clone(), cache));
        session.restore().await?;
        Ok(Self {
            config,
            backend,
            session,
        })
    }

    fn words(&self) -> WordRepository {
        WordRepository::new(self.session.clone(), self.backend.clone())
    }

    fn images(&self) -> ImageRepository {
        ImageRepository::new(self.session.clone(), self.backend.clone())
    }

    fn pipeline(&self, path: &Path) -> UploadPipeline {
        UploadPipeline::new(Arc::new(FileMediaPicker::new(path)), self.backend.clone())
    }

    fn account(&self) -> AccountController {
        AccountController::new(self.session.clone())
    }
}

fn print_word(word: &Word) {
    let mut line = format!("{}  {}", word.id, word.hanzi);
    if let Some(pinyin) = &word.pinyin {
        line.push_str(&format!(" ({pinyin})"));
    }
    line.push_str(&format!(" – {}", word.meaning_th));
    if let Some(level) = word.hsk_level {
        line.push_str(&format!("  [HSK {level}]"));
    }
    if let Some(url) = &word.image_url {
        line.push_str(&format!("  {url}"));
    }
    println!("{line}");
}

// ============================================================================
// Account
// ============================================================================

pub async fn login(config: AppConfig, email: &str, password: &str) -> Result<()> {
    let ctx = Context::connect(config).await?;
    let session = ctx.account().login(email, password).await?;
    println!("Signed in as {}", session.user.email);
    Ok(())
}

pub async fn register(config: AppConfig, args: RegisterArgs) -> Result<()> {
    let ctx = Context::connect(config).await?;
    let outcome = ctx
        .account()
        .register(RegisterForm {
            username: args.username,
            email: args.email,
            password: args.password,
            confirm_password: args.confirm_password,
        })
        .await?;
    match outcome.session {
        Some(_) => println!("Registered and signed in as {}", outcome.user.email),
        None => println!("Registered {}. Check your inbox to confirm.", outcome.user.email),
    }
    Ok(())
}

pub async fn logout(config: AppConfig) -> Result<()> {
    let ctx = Context::connect(config).await?;
    ctx.account().logout().await?;
    println!("Signed out");
    Ok(())
}

pub async fn reset_password(config: AppConfig, email: &str) -> Result<()> {
    let ctx = Context::connect(config).await?;
    ctx.account().reset_password(email).await?;
    println!("If {} has an account, a reset link is on its way", email.trim());
    Ok(())
}

pub async fn whoami(config: AppConfig) -> Result<()> {
    let ctx = Context::connect(config).await?;
    match ctx.session.current_user() {
        Some(user) => println!("{} ({})", user.email, user.id),
        None => println!("Not signed in"),
    }
    Ok(())
}

// ============================================================================
// Words
// ============================================================================

pub async fn words(config: AppConfig, command: WordsCommand) -> Result<()> {
    let ctx = Context::connect(config).await?;
    let repo = ctx.words();

    match command {
        WordsCommand::List { query } => {
            let list = WordListController::new(repo, ctx.config.search_debounce);
            list.search(query.unwrap_or_default()).await?;
            let state = list.snapshot().await;
            if state.items.is_empty() {
                println!("No words yet");
            }
            state.items.iter().for_each(print_word);
        }
        WordsCommand::Add {
            hanzi,
            meaning,
            pinyin,
            hsk,
        } => {
            let mut form = WordFormController::create(repo);
            form.form.hanzi = hanzi;
            form.form.meaning_th = meaning;
            form.form.pinyin = pinyin.unwrap_or_default();
            form.form.hsk_level = hsk;
            print_word(&form.save().await?);
        }
        WordsCommand::Edit {
            id,
            hanzi,
            meaning,
            pinyin,
            hsk,
            clear_hsk,
        } => {
            let existing = repo
                .list(&WordFilter::default())
                .await?
                .into_iter()
                .find(|w| w.id == id)
                .ok_or_else(|| Error::Custom(format!("no word with id {id}")))?;
            let mut form = WordFormController::edit(repo, existing);
            if let Some(hanzi) = hanzi {
                form.form.hanzi = hanzi;
            }
            if let Some(meaning) = meaning {
                form.form.meaning_th = meaning;
            }
            if let Some(pinyin) = pinyin {
                form.form.pinyin = pinyin;
            }
            if hsk.is_some() || clear_hsk {
                form.form.hsk_level = hsk;
            }
            print_word(&form.save().await?);
        }
        WordsCommand::Rm { id } => {
            let list = WordListController::new(repo, ctx.config.search_debounce);
            list.delete(&id).await?;
            println!("Deleted {id}");
        }
        WordsCommand::Image { id, path } => {
            let pipeline = ctx.pipeline(&path);
            let picked = pipeline
                .pick()
                .await?
                .ok_or_else(|| Error::Custom("no image picked".into()))?;
            let word = pipeline.attach_to_word(&repo, &id, &picked).await?;
            print_word(&word);
        }
    }
    Ok(())
}

// ============================================================================
// Images
// ============================================================================

pub async fn images(config: AppConfig, command: ImagesCommand) -> Result<()> {
    let ctx = Context::connect(config).await?;

    match command {
        ImagesCommand::List => {
            let images = ctx.images().list().await?;
            if images.is_empty() {
                println!("No images yet");
            }
            for image in images {
                println!("{}  {}  {}", image.id, image.created_at.format("%Y-%m-%d %H:%M"), image.image_url);
            }
        }
        ImagesCommand::Upload { path } => {
            let controller = ImageUploadController::new(ctx.pipeline(&path), ctx.images());
            if !controller.pick().await? {
                return Err(Error::Custom("no image picked".into()));
            }
            let image = controller.upload().await?;
            println!("Uploaded {}", image.image_url);
        }
        ImagesCommand::Rm { id } => {
            ctx.images().delete(&id).await?;
            println!("Deleted {id}");
        }
    }
    Ok(())
}

// ============================================================================
// Notifications & chat
// ============================================================================

pub async fn notifications(config: AppConfig, command: NotificationsCommand) -> Result<()> {
    let mut feed = NotificationsController::new(notification_repository(&config)?);

    match command {
        NotificationsCommand::List => {
            feed.load().await?;
            if feed.items().is_empty() {
                println!("ยังไม่มีการแจ้งเตือน");
            }
            for item in feed.items() {
                let marker = if item.read { ' ' } else { '•' };
                println!("{marker} [{}] {}  ({})", item.id, item.title, item.age_label());
                if let Some(body) = &item.body {
                    println!("    {body}");
                }
            }
        }
        NotificationsCommand::Read { id } => {
            feed.mark_read(&id).await?;
            println!("Marked {id} as read");
        }
        NotificationsCommand::Rm { id } => {
            feed.remove(&id).await?;
            println!("Deleted {id}");
        }
    }
    Ok(())
}

pub async fn chat(config: AppConfig, message: &str, context: usize) -> Result<()> {
    // Fail on missing configuration before touching the backend.
    let gateway = Arc::new(ChatGateway::from_config(&config)?);
    let ctx = Context::connect(config).await?;

    let words = ctx.words().list(&WordFilter::default()).await?;
    let mut chat = ChatController::new(gateway, ctx.session.clone());
    chat.set_context(&words[..words.len().min(context)]);

    if let Some(reply) = chat.send(message).await? {
        println!("{}", reply.text);
    }
    Ok(())
}

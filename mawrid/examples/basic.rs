//! Basic example of the Mawrid DI container.

use mawrid::container::prelude::*;
use std::sync::Arc;

// === Define your traits and types ===

trait Logger: Send + Sync {
    fn log(&self, msg: &str);
}

struct Console;

impl Logger for Console {
    fn log(&self, msg: &str) {
        println!("[LOG] {msg}");
    }
}

struct AppSettings {
    database_url: String,
    app_name: String,
}

struct Database {
    url: String,
    logger: Arc<dyn Logger>,
}

impl Database {
    fn query(&self, sql: &str) -> String {
        self.logger.log(&format!("Executing: {sql}"));
        format!("Results from {}", self.url)
    }
}

struct UserRepository {
    db: Arc<Database>,
}

impl UserRepository {
    fn find_user(&self, id: u64) -> String {
        self.db
            .query(&format!("SELECT * FROM users WHERE id = {id}"))
    }
}

struct UserService {
    repo: Arc<UserRepository>,
    logger: Arc<dyn Logger>,
}

impl UserService {
    fn get_user(&self, id: u64) -> String {
        self.logger.log(&format!("Getting user {id}"));
        self.repo.find_user(id)
    }
}

fn main() -> Result<()> {
    // Initialize tracing (logging)
    tracing_subscriber::fmt()
        .with_env_filter("mawrid=debug")
        .init();

    // Build the container
    let container = Container::builder()
        // Settings come from outside the container
        .from_context::<AppSettings>(APP)
        // Console — application-wide, also visible as Arc<dyn Logger>
        .provide::<Console>(APP, |_| Ok(Console))
        .alias::<Console, Arc<dyn Logger>>(|c| c as Arc<dyn Logger>)
        // Database — application-wide, depends on settings + logger
        .provide_with::<Database>(APP, deps![AppSettings, Console], |r| {
            let settings: Arc<AppSettings> = r.resolve()?;
            let logger: Arc<Arc<dyn Logger>> = r.resolve()?;
            Ok(Database {
                url: settings.database_url.clone(),
                logger: (*logger).clone(),
            })
        })
        // UserRepository — one per request scope
        .provide_with::<UserRepository>(REQUEST, deps![Database], |r| {
            let db: Arc<Database> = r.resolve()?;
            Ok(UserRepository { db })
        })
        // UserService — one per request scope, released with a hook
        .provide_disposable::<UserService>(
            REQUEST,
            deps![UserRepository],
            |r| {
                let repo: Arc<UserRepository> = r.resolve()?;
                let logger: Arc<Arc<dyn Logger>> = r.resolve()?;
                Ok(UserService {
                    repo,
                    logger: (*logger).clone(),
                })
            },
            |_| println!("[LOG] UserService released"),
        )
        .build_with_context(Context::new().with(AppSettings {
            database_url: "postgres://localhost/myapp".to_string(),
            app_name: "mawrid-demo".to_string(),
        }))?;

    println!("Container built:");
    println!("{}", container.describe());

    let settings: Arc<AppSettings> = container.get()?;
    println!("App: {}", settings.app_name);

    // === A unit of work, the way a web framework would run a request ===
    let greeting = around_unit_of_work(&container, |service: Arc<UserService>| {
        Ok(service.get_user(42))
    })?;
    println!("{greeting}");

    // === Or drive the scope by hand ===
    {
        let scope = container.open_scope()?;

        let service: Arc<UserService> = scope.get()?;
        println!("{}", service.get_user(7));

        // Resolve again in the same scope — identical instance
        let again: Arc<UserService> = scope.get()?;
        assert!(Arc::ptr_eq(&service, &again));

        scope.close()?;
    }
    // scope closed — request-scoped instances were released

    container.close()?;
    Ok(())
}

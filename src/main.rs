use anyhow::{anyhow, bail, Context};
use classroom_store::banner::ThemeCatalog;
use classroom_store::config::{self, StoreConfig};
use classroom_store::models::NewClass;
use classroom_store::Classroom;
use tracing::info;

const USAGE: &str = "\
usage: classroom-store <command> [args]

commands:
  keys [prefix]              list storage keys
  dump                       print every key and value
  usage                      storage usage, quota and availability
  classes                    list active classes
  archived                   list archived classes
  create-class <name> [section]
  archive <class-id>
  restore <class-id>
  announcements <class-id>   posts of a class, newest first
  watch <class-id> [secs]    print the post count whenever it changes
  banner <class-id>          resolve (and cache) the class banner
  clear [key]                remove one key, or everything";

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // .env is a development convenience only
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(config::log_filter("warn"))
        .with_writer(std::io::stderr)
        .init();

    let config = StoreConfig::from_env();
    info!(?config, "configuration loaded");
    let room = Classroom::open(&config);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let arg = |i: usize| args.get(i).map(String::as_str);

    match arg(0) {
        Some("keys") => {
            for key in room.storage.list_keys(arg(1)) {
                println!("{key}");
            }
        }
        Some("dump") => {
            for key in room.storage.list_keys(None) {
                println!("{key}\n  {}", room.storage.get(&key).unwrap_or_default());
            }
        }
        Some("usage") => {
            println!("available:   {}", room.storage.is_available());
            println!("used bytes:  {}", room.storage.usage_bytes());
            println!("quota bytes: {}", config.quota_bytes);
            println!("quota issue: {}", room.storage.has_quota_issue());
        }
        Some("classes") => {
            for c in room.classes.list_classes() {
                println!("{:<28} {:<30} {}", c.id, c.display_name(), c.enrollment_code);
            }
        }
        Some("archived") => {
            for c in room.classes.list_archived() {
                println!("{:<28} {}", c.id, c.display_name());
            }
        }
        Some("create-class") => {
            let name = arg(1).ok_or_else(|| anyhow!("create-class needs a name"))?;
            let created = room.classes.create_class(NewClass {
                name: name.to_string(),
                section: arg(2).map(str::to_string),
                ..Default::default()
            })?;
            println!("{} (code {})", created.id, created.enrollment_code);
        }
        Some("archive") => {
            let id = arg(1).ok_or_else(|| anyhow!("archive needs a class id"))?;
            if !room.classes.archive_class(id)? {
                println!("no active class '{id}'");
            }
        }
        Some("restore") => {
            let id = arg(1).ok_or_else(|| anyhow!("restore needs a class id"))?;
            if !room.classes.restore_class(id)? {
                println!("no archived class '{id}'");
            }
        }
        Some("announcements") => {
            let id = arg(1).ok_or_else(|| anyhow!("announcements needs a class id"))?;
            for a in room.announcements.list_by_class(id) {
                println!(
                    "{} {} ({} comments)\n  {}",
                    a.created_at.to_rfc3339(),
                    a.author_name,
                    a.comments.len(),
                    a.content
                );
            }
        }
        Some("watch") => {
            let id = arg(1).ok_or_else(|| anyhow!("watch needs a class id"))?;
            let secs: u64 = match arg(2) {
                Some(s) => s.parse().with_context(|| format!("bad duration '{s}'"))?,
                None => 30,
            };
            let mut last = None;
            let _poller = room.poll_announcements(id, move |posts| {
                if last != Some(posts.len()) {
                    last = Some(posts.len());
                    println!("{} posts", posts.len());
                }
            });
            tokio::time::sleep(std::time::Duration::from_secs(secs)).await;
        }
        Some("banner") => {
            let id = arg(1).ok_or_else(|| anyhow!("banner needs a class id"))?;
            let class = room
                .classes
                .get_class(id)
                .with_context(|| format!("no active class '{id}'"))?;
            println!("{}", room.banners.resolve(&class, &ThemeCatalog).await);
        }
        Some("clear") => match arg(1) {
            Some(key) => room.storage.remove(key)?,
            None => room.storage.clear()?,
        },
        Some(other) => bail!("unknown command '{other}'\n\n{USAGE}"),
        None => println!("{USAGE}"),
    }
    Ok(())
}

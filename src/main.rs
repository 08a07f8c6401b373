use chat_intake_lib::config::AppSettings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = AppSettings::load()?;
    chat_intake_lib::run(settings).await
}

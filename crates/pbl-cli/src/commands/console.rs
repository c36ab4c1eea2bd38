use anyhow::Result;

use crate::app::AppContext;
use crate::repl::Console;

/// Opens the learner console of `device`.
pub async fn learner(app: &AppContext, device: &str) -> Result<()> {
    let controller = app.controller(device).await?;
    Console::new(controller)?.run().await
}

/// Opens a console straight in the admin view.
pub async fn admin(app: &AppContext, device: &str) -> Result<()> {
    let controller = app.controller(device).await?;
    controller.enter_admin().await;
    Console::new(controller)?.run().await
}

use std::sync::Arc;

use crate::application::{
    panel::PurgePanel, purge::PurgeAction, regeneration::KeyRegenerationGuard,
    repos::OptionStore,
};

#[derive(Clone)]
pub struct AdminState {
    pub panel: Arc<PurgePanel>,
    pub regeneration: Arc<KeyRegenerationGuard>,
    pub purge_action: Arc<dyn PurgeAction>,
    pub store: Arc<dyn OptionStore>,
}

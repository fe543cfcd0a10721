use crate::registry::Registry;
use crate::settings::Settings;

pub(crate) struct ServerState {
    pub(crate) settings: Settings,
    pub(crate) registry: Registry,
}

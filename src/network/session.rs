// Per-connection state, fixed at accept time and enriched by the handshake

use crate::protocol::{
    status, CapabilityFlags, HandshakeResponse, ServerCapabilities, AUTH_PLUGIN_DATA_LEN,
    DEFAULT_COLLATION_ID,
};

#[derive(Debug, Clone)]
pub struct Session {
    connection_id: u32,
    capabilities: CapabilityFlags,
    status_flags: u16,
    collation_id: u8,
    salt: [u8; AUTH_PLUGIN_DATA_LEN],
    username: Option<String>,
    database: Option<String>,
    client_capabilities: Option<CapabilityFlags>,
}

impl Session {
    /// Creates the state for a fresh connection. Taking `ServerCapabilities`
    /// rather than raw flags means every session starts from a validated set.
    pub fn new(
        connection_id: u32,
        capabilities: ServerCapabilities,
        salt: [u8; AUTH_PLUGIN_DATA_LEN],
    ) -> Self {
        Self {
            connection_id,
            capabilities: capabilities.flags(),
            status_flags: status::SERVER_STATUS_AUTOCOMMIT,
            collation_id: DEFAULT_COLLATION_ID,
            salt,
            username: None,
            database: None,
            client_capabilities: None,
        }
    }

    pub fn connection_id(&self) -> u32 {
        self.connection_id
    }

    pub fn capabilities(&self) -> CapabilityFlags {
        self.capabilities
    }

    pub fn status_flags(&self) -> u16 {
        self.status_flags
    }

    pub fn collation_id(&self) -> u8 {
        self.collation_id
    }

    pub fn salt(&self) -> &[u8; AUTH_PLUGIN_DATA_LEN] {
        &self.salt
    }

    /// Username from the handshake response, once negotiated.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Database requested at connect time, if any.
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// Capability set the client declared, once negotiated.
    pub fn client_capabilities(&self) -> Option<CapabilityFlags> {
        self.client_capabilities
    }

    pub(crate) fn absorb_response(&mut self, response: &HandshakeResponse) {
        self.username = Some(response.username.clone());
        self.database = response.database.clone();
        self.client_capabilities = Some(response.capabilities);
    }
}

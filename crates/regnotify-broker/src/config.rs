//! Broker configuration.

/// Tunables for a [`Broker`](crate::Broker).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Capacity of the command channel. Callers wait for room once this
    /// many commands are queued and not yet handled by the loop.
    pub command_buffer: usize,
}

fn default_command_buffer() -> usize {
    16
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            command_buffer: default_command_buffer(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        assert_eq!(BrokerConfig::default().command_buffer, 16);
    }
}

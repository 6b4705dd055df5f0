use once_cell::sync::OnceCell;

use super::Client;

static GLOBAL: OnceCell<Client> = OnceCell::new();

/// Process-wide client, created unconfigured on first access.
///
/// The instance is never replaced or reset. Configure it with
/// [`Client::configure`] before connecting.
pub fn global() -> &'static Client {
    GLOBAL.get_or_init(Client::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_is_a_single_instance() {
        let a = global() as *const Client;
        let b = global() as *const Client;
        assert_eq!(a, b);
    }
}

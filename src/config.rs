use std::env;

/// Category labels offered when HELP_CATEGORIES is not set.
pub const DEFAULT_HELP_CATEGORIES: &[&str] = &[
    "Mental Health Support",
    "Legal Advice",
    "Community Connection",
    "Housing Assistance",
    "Healthcare Services",
    "Employment",
    "General Inquiry",
];

#[derive(Clone)]
pub struct Config {
    pub mongo_uri: String,
    pub database_name: String,
    pub jwt_secret: String,
    /// The one reserved email allowed to self-sign-up as the first admin.
    pub bootstrap_admin_email: String,
    /// When enabled, new requests start in pending_payment_approval instead of pending.
    pub payment_gate_enabled: bool,
    pub help_categories: Vec<String>,
    pub frontend_origin: String,
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let payment_gate_enabled = env::var("PAYMENT_GATE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        let help_categories = match env::var("HELP_CATEGORIES") {
            Ok(raw) => parse_categories(&raw),
            Err(_) => DEFAULT_HELP_CATEGORIES.iter().map(|c| c.to_string()).collect(),
        };

        Self {
            mongo_uri: env::var("MONGO_URI").expect("MONGO_URI must be set"),
            database_name: env::var("DATABASE_NAME").unwrap_or_else(|_| "community_care".to_string()),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            bootstrap_admin_email: env::var("BOOTSTRAP_ADMIN_EMAIL")
                .expect("BOOTSTRAP_ADMIN_EMAIL must be set"),
            payment_gate_enabled,
            help_categories,
            frontend_origin: env::var("FRONTEND_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        }
    }

    pub fn is_known_category(&self, category: &str) -> bool {
        self.help_categories.iter().any(|c| c == category)
    }
}

fn parse_categories(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_categories(categories: Vec<String>) -> Config {
        Config {
            mongo_uri: "mongodb://localhost:27017".to_string(),
            database_name: "test".to_string(),
            jwt_secret: "secret".to_string(),
            bootstrap_admin_email: "admin@example.com".to_string(),
            payment_gate_enabled: true,
            help_categories: categories,
            frontend_origin: "http://localhost:3000".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
        }
    }

    #[test]
    fn parses_comma_separated_categories() {
        let parsed = parse_categories("Legal Advice, Employment ,General Inquiry");
        assert_eq!(parsed, vec!["Legal Advice", "Employment", "General Inquiry"]);
    }

    #[test]
    fn drops_empty_category_entries() {
        let parsed = parse_categories("Legal Advice,, ,Employment");
        assert_eq!(parsed, vec!["Legal Advice", "Employment"]);
    }

    #[test]
    fn default_category_list_is_complete() {
        assert_eq!(DEFAULT_HELP_CATEGORIES.len(), 7);
        assert!(DEFAULT_HELP_CATEGORIES.contains(&"Mental Health Support"));
        assert!(DEFAULT_HELP_CATEGORIES.contains(&"General Inquiry"));
    }

    #[test]
    fn category_lookup_is_exact() {
        let config = config_with_categories(vec!["Legal Advice".to_string()]);
        assert!(config.is_known_category("Legal Advice"));
        assert!(!config.is_known_category("legal advice"));
        assert!(!config.is_known_category("Tax Advice"));
    }
}

use serde::{Deserialize, Serialize};

/// Toolkits that can be connected through Composio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppType {
    Gmail,
    Slack,
    Github,
    Notion,
    #[serde(rename = "googledrive")]
    GoogleDrive,
    #[serde(rename = "googlecalendar")]
    GoogleCalendar,
    Trello,
    Asana,
    Discord,
    Twitter,
    Linkedin,
    Hubspot,
    Salesforce,
    Zoom,
    Dropbox,
}

impl AppType {
    pub const ALL: [AppType; 15] = [
        AppType::Gmail,
        AppType::Slack,
        AppType::Github,
        AppType::Notion,
        AppType::GoogleDrive,
        AppType::GoogleCalendar,
        AppType::Trello,
        AppType::Asana,
        AppType::Discord,
        AppType::Twitter,
        AppType::Linkedin,
        AppType::Hubspot,
        AppType::Salesforce,
        AppType::Zoom,
        AppType::Dropbox,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            Self::Gmail => "gmail",
            Self::Slack => "slack",
            Self::Github => "github",
            Self::Notion => "notion",
            Self::GoogleDrive => "googledrive",
            Self::GoogleCalendar => "googlecalendar",
            Self::Trello => "trello",
            Self::Asana => "asana",
            Self::Discord => "discord",
            Self::Twitter => "twitter",
            Self::Linkedin => "linkedin",
            Self::Hubspot => "hubspot",
            Self::Salesforce => "salesforce",
            Self::Zoom => "zoom",
            Self::Dropbox => "dropbox",
        }
    }

    /// Case-insensitive slug lookup.
    pub fn from_slug(slug: &str) -> Option<Self> {
        let slug = slug.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|app| app.slug() == slug)
    }

    /// Title-cased display name derived from the slug.
    pub fn display_name(&self) -> String {
        title_case(&self.slug().replace('_', " "))
    }

    pub fn toolkit_info(&self) -> ToolkitInfo {
        let name = self.display_name();
        ToolkitInfo {
            slug: self.slug().to_string(),
            description: format!("{} integration via Composio", name),
            name,
            logo_url: None,
            categories: Vec::new(),
            auth_schemes: vec![AuthScheme {
                scheme_type: AuthSchemeType::Oauth2,
                fields: None,
            }],
        }
    }
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthSchemeType {
    Oauth2,
    Oauth1,
    ApiKey,
    BasicAuth,
    BearerToken,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthSchemeFields {
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub optional: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthScheme {
    #[serde(rename = "type")]
    pub scheme_type: AuthSchemeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<AuthSchemeFields>,
}

/// Toolkit (app) summary shown in the integrations catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolkitInfo {
    pub slug: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub auth_schemes: Vec<AuthScheme>,
}

impl ToolkitInfo {
    /// Case-insensitive substring match over name, description and slug.
    pub fn matches_search(&self, query: &str) -> bool {
        let q = query.to_lowercase();
        self.name.to_lowercase().contains(&q)
            || self.description.to_lowercase().contains(&q)
            || self.slug.to_lowercase().contains(&q)
    }
}

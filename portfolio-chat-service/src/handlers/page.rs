use askama::Template;
use axum::response::IntoResponse;

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub owner: &'static str,
    pub role: &'static str,
    pub email: &'static str,
    pub github_url: &'static str,
}

impl Default for IndexTemplate {
    fn default() -> Self {
        Self {
            owner: "Alexis Patac",
            role: "Front-End Developer",
            email: "nicealexis.patac@gmail.com",
            github_url: "https://github.com/AlexisPatac",
        }
    }
}

/// `GET /`: the portfolio page with the chat widget.
pub async fn index() -> impl IntoResponse {
    IndexTemplate::default()
}

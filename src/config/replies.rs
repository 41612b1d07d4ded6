use serde::Deserialize;
use std::error::Error;
use std::fmt;
use std::fs;
use std::sync::Arc;
use log::info;

#[derive(Debug)]
pub enum RepliesError {
    EmptyText(String),
    IoError(std::io::Error),
    JsonError(serde_json::Error),
}

impl fmt::Display for RepliesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepliesError::EmptyText(key) => write!(f, "Reply text '{}' is empty", key),
            RepliesError::IoError(e) => write!(f, "Replies file IO error: {}", e),
            RepliesError::JsonError(e) => write!(f, "Replies JSON parsing error: {}", e),
        }
    }
}

impl Error for RepliesError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RepliesError::IoError(e) => Some(e),
            RepliesError::JsonError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RepliesError {
    fn from(err: std::io::Error) -> Self {
        RepliesError::IoError(err)
    }
}

impl From<serde_json::Error> for RepliesError {
    fn from(err: serde_json::Error) -> Self {
        RepliesError::JsonError(err)
    }
}

/// Fixed reply texts sent without a provider call. Every field has a
/// built-in default so a replies file only needs the keys it overrides.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Replies {
    pub welcome: String,
    pub help: String,
    pub chat_mode_on: String,
    pub reset_done: String,
    pub fallback: String,
    pub feedback_thanks: String,
    pub feedback_sorry: String,
}

impl Default for Replies {
    fn default() -> Self {
        Self {
            welcome: "Hello! I am your AI assistant. How can I help you today?\n\n\
                      Use /chat to start a conversation with me\n\
                      Use /reset to clear our conversation history\n\
                      Use /help to see all available commands".to_string(),
            help: "Available commands:\n\n\
                   /start - Start the conversation and show the menu\n\
                   /chat - Start chatting with the AI\n\
                   /reset - Reset your conversation history\n\
                   /help - Show this help message".to_string(),
            chat_mode_on: "Chat mode enabled! You can now talk to me directly. \
                           What would you like to discuss?".to_string(),
            reset_done: "Your conversation history has been reset.".to_string(),
            fallback: "Sorry, an error occurred while generating the response. \
                       Please try again later.".to_string(),
            feedback_thanks: "Thank you for your positive feedback!".to_string(),
            feedback_sorry: "I am sorry my answer was not helpful. \
                             How can I improve?".to_string(),
        }
    }
}

impl Replies {
    fn validate(&self) -> Result<(), RepliesError> {
        let texts = [
            ("welcome", &self.welcome),
            ("help", &self.help),
            ("chat_mode_on", &self.chat_mode_on),
            ("reset_done", &self.reset_done),
            ("fallback", &self.fallback),
            ("feedback_thanks", &self.feedback_thanks),
            ("feedback_sorry", &self.feedback_sorry),
        ];
        for (key, text) in texts {
            if text.trim().is_empty() {
                return Err(RepliesError::EmptyText(key.to_string()));
            }
        }
        Ok(())
    }
}

/// Loads reply texts, falling back to the defaults when no path is given.
pub fn load_replies(path: Option<&str>) -> Result<Arc<Replies>, Box<dyn Error + Send + Sync>> {
    let replies = match path {
        Some(path) => {
            let file_content = fs
                ::read_to_string(path)
                .map_err(|e| format!("Failed to read replies file '{}': {}", path, e))?;
            let replies: Replies = serde_json
                ::from_str(&file_content)
                .map_err(|e| format!("Failed to parse replies file '{}': {}", path, e))?;
            replies.validate()?;
            info!("Loaded reply texts from: {}", path);
            replies
        }
        None => Replies::default(),
    };
    Ok(Arc::new(replies))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_load_without_a_file() {
        let replies = load_replies(None).unwrap();
        assert!(replies.welcome.contains("/chat"));
        assert!(!replies.fallback.is_empty());
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let mut file = tempfile();
        write!(file.1, r#"{{"welcome":"Hi from the test bot"}}"#).unwrap();
        let replies = load_replies(Some(file.0.to_str().unwrap())).unwrap();
        assert_eq!(replies.welcome, "Hi from the test bot");
        assert_eq!(replies.reset_done, Replies::default().reset_done);
    }

    #[test]
    fn empty_text_is_rejected() {
        let mut file = tempfile();
        write!(file.1, r#"{{"fallback":"  "}}"#).unwrap();
        assert!(load_replies(Some(file.0.to_str().unwrap())).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_replies(Some("/nonexistent/replies.json")).is_err());
    }

    fn tempfile() -> (std::path::PathBuf, std::fs::File) {
        let path = std::env::temp_dir().join(
            format!("replies-test-{}-{}.json", std::process::id(), rand_suffix())
        );
        let file = std::fs::File::create(&path).unwrap();
        (path, file)
    }

    fn rand_suffix() -> u128 {
        std::time::SystemTime
            ::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    }
}

use serde::{Deserialize, Serialize};

#[derive(Serialize, Debug)]
pub struct ChatBody<'a> {
    pub model: &'a str,
    pub temperature: f32,
    pub messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize, Debug)]
pub struct ChatMessage<'a> {
    pub role: Role,
    pub content: &'a str,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Deserialize, Debug)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn body_uses_lowercase_roles() {
        let body = ChatBody {
            model: "gpt-4o-mini",
            temperature: 0.4,
            messages: vec![
                ChatMessage {
                    role: Role::System,
                    content: "persona",
                },
                ChatMessage {
                    role: Role::User,
                    content: "question",
                },
            ],
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["messages"][0]["role"], json!("system"));
        assert_eq!(value["messages"][1]["role"], json!("user"));
        assert_eq!(value["model"], json!("gpt-4o-mini"));
    }

    #[test]
    fn response_tolerates_missing_choices_and_null_content() {
        let empty: ChatResponse = serde_json::from_str(r#"{"id":"x"}"#).unwrap();
        assert!(empty.choices.is_empty());

        let null: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#)
                .unwrap();
        assert_eq!(null.choices[0].message.content, None);
    }
}

//! Prompt assembly for chat replies and diary composition

use tokitsuzuri_core::{Message, Role};

/// System prompt for conversational replies
pub const CHAT_SYSTEM_PROMPT: &str = "あなたは親しみやすく共感的な日記アシスタントです。ユーザーとの自然な会話を通じて、日記作成をサポートしてください。ユーザーの話を聞き、適切なタイミングで感情や体験について掘り下げ質問をしてください。会話が十分に進んだら、内容を整理して素敵な日記エントリーを作成してください。";

/// System prompt for diary composition
pub const DIARY_SYSTEM_PROMPT: &str =
    "あなたは優秀な日記ライターです。ユーザーとの会話を基に、感情豊かで読みやすい日記を作成してください。";

/// First line shown when a conversation starts
pub const GREETING: &str = "こんにちは！今日はどんな一日でしたか？お話を聞かせてください。";

/// Sentence spoken by the voice test
pub const VOICE_TEST_TEXT: &str = "こんにちは！これは音声テストです。設定が正しく反映されていますか？";

/// Render the conversation as labelled lines
pub fn render_transcript(history: &[Message]) -> String {
    history
        .iter()
        .map(|message| {
            let label = match message.role {
                Role::User => "ユーザー",
                _ => "AI",
            };
            format!("{}: {}", label, message.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The single user turn asking for a diary written from `history`
pub fn build_diary_request(history: &[Message]) -> Message {
    Message::user(format!(
        "これまでの会話を基に、今日の出来事や感情を整理して、素敵な日記エントリーを作成してください。日記のタイトルと内容を含めて、読みやすい形式で作成してください。\n\n会話履歴：\n{}\n\n日記フォーマット：\n# [日記のタイトル]\n\n[日記の内容]",
        render_transcript(history)
    ))
}

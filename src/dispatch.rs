//! Trigger Classifier & Message Dispatch
//!
//! Per-message branch logic: mention gating for group chats, the
//! direct-message link exception, the tokenize / relay / help branches, and
//! the per-identifier reply sequencing. One dispatcher instance serves all
//! conversations; each inbound message is handled by its own task, but the
//! identifiers within a single message run strictly sequentially so the
//! replies arrive in order.

use std::sync::Arc;

use alloy::signers::local::PrivateKeySigner;
use anyhow::Result;
use tracing::{info, warn};

use crate::coin::{classify_failure, idempotency, workflow};
use crate::config::AgentConfig;
use crate::extract;
use crate::forum::ForumClient;
use crate::mentions::MentionGate;
use crate::relay::{self, RelayClient};
use crate::suggestion::CopySuggestion;
use crate::types::{ConversationKind, InboundMessage, Messaging, SongcastBackend};

/// Acknowledgment reaction when the agent is mentioned.
const MENTION_ACK: &str = "👀";

/// Acknowledgment reaction for a pasted link in a direct chat.
const LINK_ACK: &str = "🎵";

const HELP_TEXT: &str = "🎵 Hi! I'm Song, the Music Tokenizer by Songcast.xyz 💽 \
Send me a Spotify track URL and I'll tokenize it for you!\n\n\
Examples:\n\
• https://open.spotify.com/intl-de/track/4gMgiXfqyzZLMhsksGmbQV\n\
• 4gMgiXfqyzZLMhsksGmbQV\n\
Any format works fine! Simply paste the Link or ID here and I'll start creating the song coin! 🚀";

/// Stateless-per-message dispatcher wiring the classifier to the workflow.
pub struct Dispatcher {
    messaging: Arc<dyn Messaging>,
    backend: Arc<dyn SongcastBackend>,
    signer: PrivateKeySigner,
    mentions: MentionGate,
    relay: Option<RelayClient>,
    forum: Option<ForumClient>,
    base_url: String,
    escrow_address: Option<String>,
}

impl Dispatcher {
    pub fn new(
        config: &AgentConfig,
        messaging: Arc<dyn Messaging>,
        backend: Arc<dyn SongcastBackend>,
    ) -> Result<Self> {
        Ok(Self {
            messaging,
            backend,
            signer: config.signer()?,
            mentions: MentionGate::new(&config.mention_handles)?,
            relay: config.relay_url.clone().map(RelayClient::new),
            forum: config.forum.as_ref().map(ForumClient::new),
            base_url: config.base_url.clone(),
            escrow_address: config.escrow_address.clone(),
        })
    }

    /// Classify one inbound message and run the selected branch. All
    /// failures are handled here; the caller never sees an error.
    pub async fn handle_message(&self, message: InboundMessage) {
        let mentioned = self.mentions.is_mentioned(&message.text);
        let raw_links = extract::extract_track_links(&message.text);
        let relay_enabled = self.relay.is_some();

        // Group chats only answer when addressed.
        if message.conversation_kind == ConversationKind::Group && !mentioned {
            return;
        }

        // Direct chats: a pasted link is intent on its own, but arbitrary
        // text without a mention stays unanswered.
        if message.conversation_kind == ConversationKind::Direct
            && !mentioned
            && raw_links.is_empty()
            && !(relay_enabled && relay::looks_like_intent(&message.text))
        {
            return;
        }

        let (working_text, links) = if mentioned {
            self.react(&message, MENTION_ACK).await;
            let cleaned = self.mentions.strip_mention(&message.text);
            let links = extract::extract_track_links(&cleaned);
            (cleaned, links)
        } else {
            (message.text.clone(), raw_links)
        };

        if !links.is_empty() {
            if message.conversation_kind == ConversationKind::Direct && !mentioned {
                self.react(&message, LINK_ACK).await;
            }
            // Sequential on purpose: replies for one message stay ordered.
            for link in &links {
                self.tokenize(&message.conversation_id, link).await;
            }
            return;
        }

        if relay_enabled && relay::looks_like_intent(&working_text) {
            self.relay_prompt(&message.conversation_id, &working_text)
                .await;
            return;
        }

        if mentioned {
            self.reply(&message.conversation_id, HELP_TEXT).await;
        }
    }

    /// Run the guard + workflow for one extracted surface form and reply
    /// with the outcome.
    async fn tokenize(&self, conversation_id: &str, link: &str) {
        let track_id = match extract::parse_track_id(link) {
            Some(id) => id,
            None => {
                self.reply(
                    conversation_id,
                    &format!("❌ Could not parse Spotify track ID from: {}", link),
                )
                .await;
                return;
            }
        };

        if let Some(existing) = idempotency::lookup_existing(self.backend.as_ref(), &track_id).await
        {
            info!("track {} already tokenized as {}", track_id, existing);
            self.reply(
                conversation_id,
                &format!(
                    "🎵 This track is already tokenized!\n\n\
                     🪙 Coin Address: {}\n\
                     🔗 View: https://songcast.xyz/coins/{}",
                    existing, existing
                ),
            )
            .await;
            return;
        }

        self.reply(
            conversation_id,
            "🎵 Processing Spotify track... Creating your music coin!",
        )
        .await;

        let result = workflow::create_coin_for_track(
            self.backend.as_ref(),
            &self.signer,
            self.escrow_address.as_deref(),
            &track_id,
        )
        .await;

        match result {
            Ok(record) => {
                self.reply(
                    conversation_id,
                    &format!(
                        "✅ Coin created successfully!\n\n\
                         🎵 Track: {} by {}\n\
                         🪙 Coin Address: {}\n\
                         🔗 View: https://songcast.xyz/coins/{}\n\
                         📊 Transaction: https://basescan.org/tx/{}",
                        record.name,
                        record.artist,
                        record.coin_address,
                        record.coin_address,
                        record.transaction_hash
                    ),
                )
                .await;

                let suggestion = CopySuggestion {
                    label: "Copy coin address".to_string(),
                    text: record.coin_address.clone(),
                };
                if let Err(e) = self
                    .messaging
                    .send_suggestion(conversation_id, &suggestion)
                    .await
                {
                    warn!("copy-suggestion send failed: {:#}", e);
                }

                // Registrations run after the user already has their reply.
                idempotency::fan_out(self.backend.as_ref(), self.forum.as_ref(), &record).await;
            }
            Err(e) => {
                warn!("tokenization failed for {}: {:#}", track_id, e);
                let failure = classify_failure(&e, &self.base_url);
                self.reply(
                    conversation_id,
                    &format!("❌ Error creating coin for {}:\n{}", link, failure),
                )
                .await;
            }
        }
    }

    async fn relay_prompt(&self, conversation_id: &str, prompt: &str) {
        // Guarded by the branch condition in handle_message.
        let Some(relay) = &self.relay else { return };
        match relay.submit_and_await(prompt).await {
            Ok(outcome) => self.reply(conversation_id, &outcome.into_reply()).await,
            Err(e) => {
                warn!("relay request failed: {:#}", e);
                self.reply(
                    conversation_id,
                    "❌ The assistant is unreachable right now. Please try again later.",
                )
                .await;
            }
        }
    }

    async fn reply(&self, conversation_id: &str, text: &str) {
        if let Err(e) = self.messaging.send_text(conversation_id, text).await {
            warn!("reply send failed: {:#}", e);
        }
    }

    async fn react(&self, message: &InboundMessage, emoji: &str) {
        if let Err(e) = self
            .messaging
            .send_reaction(&message.conversation_id, &message.id, emoji)
            .await
        {
            warn!("reaction send failed: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::Value;

    use super::*;
    use crate::types::{
        CoinRequest, MintReceipt, MintResponse, Track, TrackArtist,
    };

    const TRACK_ID: &str = "4gMgiXfqyzZLMhsksGmbQV";
    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[derive(Default)]
    struct MockMessaging {
        texts: Mutex<Vec<String>>,
        reactions: Mutex<Vec<String>>,
        suggestions: Mutex<Vec<CopySuggestion>>,
        fail_reactions: bool,
    }

    #[async_trait]
    impl Messaging for MockMessaging {
        async fn send_text(&self, _: &str, text: &str) -> anyhow::Result<()> {
            self.texts.lock().unwrap().push(text.to_string());
            Ok(())
        }
        async fn send_reaction(&self, _: &str, _: &str, emoji: &str) -> anyhow::Result<()> {
            if self.fail_reactions {
                anyhow::bail!("reaction rejected");
            }
            self.reactions.lock().unwrap().push(emoji.to_string());
            Ok(())
        }
        async fn send_suggestion(
            &self,
            _: &str,
            suggestion: &CopySuggestion,
        ) -> anyhow::Result<()> {
            self.suggestions.lock().unwrap().push(suggestion.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockBackend {
        known_coin: Option<String>,
        mint_calls: AtomicUsize,
        registers_fail: bool,
    }

    #[async_trait]
    impl SongcastBackend for MockBackend {
        async fn fetch_track(&self, track_id: &str) -> anyhow::Result<Track> {
            Ok(Track {
                id: track_id.to_string(),
                name: "Neon Nights".to_string(),
                artists: vec![TrackArtist {
                    id: "artist-1".to_string(),
                    name: "The Waveforms".to_string(),
                }],
                ..Track::default()
            })
        }
        async fn publish_metadata(&self, _: &Value) -> anyhow::Result<String> {
            Ok("ipfs://QmTestHash".to_string())
        }
        async fn request_mint(
            &self,
            _: &CoinRequest,
            _: Option<&str>,
        ) -> anyhow::Result<MintResponse> {
            self.mint_calls.fetch_add(1, Ordering::SeqCst);
            Ok(MintResponse::Minted(MintReceipt {
                coin_address: "0xNEWC01N".to_string(),
                transaction_hash: "0xtx".to_string(),
            }))
        }
        async fn lookup_known_coin(&self, _: &str) -> anyhow::Result<Option<String>> {
            Ok(self.known_coin.clone())
        }
        async fn lookup_coin_map(&self, _: &str) -> anyhow::Result<Option<String>> {
            Ok(None)
        }
        async fn register_known_coin(&self, _: &str) -> anyhow::Result<()> {
            if self.registers_fail {
                anyhow::bail!("registry down");
            }
            Ok(())
        }
        async fn register_coin_map(&self, _: &str, _: &str) -> anyhow::Result<()> {
            if self.registers_fail {
                anyhow::bail!("registry down");
            }
            Ok(())
        }
        async fn register_points(&self, _: &str) -> anyhow::Result<()> {
            if self.registers_fail {
                anyhow::bail!("registry down");
            }
            Ok(())
        }
    }

    fn test_config() -> AgentConfig {
        AgentConfig {
            wallet_key: TEST_KEY.to_string(),
            base_url: "http://localhost:3000".to_string(),
            gateway_url: "http://localhost:4000".to_string(),
            mention_handles: vec![
                "song.base.eth".to_string(),
                "songcast".to_string(),
                "song".to_string(),
            ],
            escrow_address: None,
            forum: None,
            relay_url: None,
        }
    }

    fn dispatcher(
        messaging: Arc<MockMessaging>,
        backend: Arc<MockBackend>,
    ) -> Dispatcher {
        Dispatcher::new(&test_config(), messaging, backend).unwrap()
    }

    fn message(kind: ConversationKind, text: &str) -> InboundMessage {
        InboundMessage {
            id: "msg-1".to_string(),
            text: text.to_string(),
            sender_id: "0xsender".to_string(),
            conversation_id: "conv-1".to_string(),
            conversation_kind: kind,
        }
    }

    #[tokio::test]
    async fn test_group_without_mention_is_silent() {
        let messaging = Arc::new(MockMessaging::default());
        let backend = Arc::new(MockBackend::default());
        let d = dispatcher(messaging.clone(), backend.clone());

        let text = format!("check this out https://open.spotify.com/track/{}", TRACK_ID);
        d.handle_message(message(ConversationKind::Group, &text)).await;

        assert!(messaging.texts.lock().unwrap().is_empty());
        assert!(messaging.reactions.lock().unwrap().is_empty());
        assert!(messaging.suggestions.lock().unwrap().is_empty());
        assert_eq!(backend.mint_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_direct_plain_text_without_mention_is_silent() {
        let messaging = Arc::new(MockMessaging::default());
        let backend = Arc::new(MockBackend::default());
        let d = dispatcher(messaging.clone(), backend);

        d.handle_message(message(ConversationKind::Direct, "hello there"))
            .await;

        assert!(messaging.texts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_direct_link_without_mention_tokenizes_with_ack() {
        let messaging = Arc::new(MockMessaging::default());
        let backend = Arc::new(MockBackend::default());
        let d = dispatcher(messaging.clone(), backend.clone());

        let text = format!("spotify:track:{}", TRACK_ID);
        d.handle_message(message(ConversationKind::Direct, &text)).await;

        assert_eq!(*messaging.reactions.lock().unwrap(), vec![LINK_ACK]);
        assert_eq!(backend.mint_calls.load(Ordering::SeqCst), 1);

        let texts = messaging.texts.lock().unwrap();
        assert!(texts[0].contains("Processing"));
        assert!(texts[1].contains("Coin created successfully"));
        assert!(texts[1].contains("0xNEWC01N"));

        let suggestions = messaging.suggestions.lock().unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].text, "0xNEWC01N");
    }

    #[tokio::test]
    async fn test_group_mention_with_link_acks_and_tokenizes() {
        let messaging = Arc::new(MockMessaging::default());
        let backend = Arc::new(MockBackend::default());
        let d = dispatcher(messaging.clone(), backend.clone());

        let text = format!(
            "@songcast mint https://open.spotify.com/track/{}",
            TRACK_ID
        );
        d.handle_message(message(ConversationKind::Group, &text)).await;

        assert_eq!(*messaging.reactions.lock().unwrap(), vec![MENTION_ACK]);
        assert_eq!(backend.mint_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_already_tokenized_skips_mint() {
        let messaging = Arc::new(MockMessaging::default());
        let backend = Arc::new(MockBackend {
            known_coin: Some("0xEXISTING".to_string()),
            ..MockBackend::default()
        });
        let d = dispatcher(messaging.clone(), backend.clone());

        d.handle_message(message(ConversationKind::Direct, TRACK_ID))
            .await;

        assert_eq!(backend.mint_calls.load(Ordering::SeqCst), 0);
        let texts = messaging.texts.lock().unwrap();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("already tokenized"));
        assert!(texts[0].contains("0xEXISTING"));
    }

    #[tokio::test]
    async fn test_fan_out_failures_do_not_change_success_reply() {
        let ok_messaging = Arc::new(MockMessaging::default());
        let ok_backend = Arc::new(MockBackend::default());
        let failing_messaging = Arc::new(MockMessaging::default());
        let failing_backend = Arc::new(MockBackend {
            registers_fail: true,
            ..MockBackend::default()
        });

        let text = format!("spotify:track:{}", TRACK_ID);
        dispatcher(ok_messaging.clone(), ok_backend)
            .handle_message(message(ConversationKind::Direct, &text))
            .await;
        dispatcher(failing_messaging.clone(), failing_backend)
            .handle_message(message(ConversationKind::Direct, &text))
            .await;

        assert_eq!(
            *ok_messaging.texts.lock().unwrap(),
            *failing_messaging.texts.lock().unwrap()
        );
    }

    #[tokio::test]
    async fn test_reaction_failure_does_not_block_tokenization() {
        let messaging = Arc::new(MockMessaging {
            fail_reactions: true,
            ..MockMessaging::default()
        });
        let backend = Arc::new(MockBackend::default());
        let d = dispatcher(messaging.clone(), backend.clone());

        let text = format!("spotify:track:{}", TRACK_ID);
        d.handle_message(message(ConversationKind::Direct, &text)).await;

        assert_eq!(backend.mint_calls.load(Ordering::SeqCst), 1);
        assert!(messaging
            .texts
            .lock()
            .unwrap()
            .iter()
            .any(|t| t.contains("Coin created successfully")));
    }

    #[tokio::test]
    async fn test_mention_without_link_sends_help() {
        let messaging = Arc::new(MockMessaging::default());
        let backend = Arc::new(MockBackend::default());
        let d = dispatcher(messaging.clone(), backend.clone());

        d.handle_message(message(ConversationKind::Group, "@song what can you do?"))
            .await;

        let texts = messaging.texts.lock().unwrap();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("Music Tokenizer"));
        assert_eq!(backend.mint_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_multiple_links_reply_in_order() {
        let messaging = Arc::new(MockMessaging::default());
        let backend = Arc::new(MockBackend::default());
        let d = dispatcher(messaging.clone(), backend.clone());

        let second = "1111111111222222222233";
        let text = format!(
            "https://open.spotify.com/track/{} and spotify:track:{}",
            TRACK_ID, second
        );
        d.handle_message(message(ConversationKind::Direct, &text)).await;

        assert_eq!(backend.mint_calls.load(Ordering::SeqCst), 2);
        let texts = messaging.texts.lock().unwrap();
        // Processing/success pairs stay grouped per identifier.
        assert!(texts[0].contains("Processing"));
        assert!(texts[1].contains("Coin created"));
        assert!(texts[2].contains("Processing"));
        assert!(texts[3].contains("Coin created"));
    }

    #[tokio::test]
    async fn test_workflow_failure_gets_classified_reply() {
        struct FailingMint(MockBackend);

        #[async_trait]
        impl SongcastBackend for FailingMint {
            async fn fetch_track(&self, _: &str) -> anyhow::Result<Track> {
                anyhow::bail!("Spotify track lookup failed: 404")
            }
            async fn publish_metadata(&self, _: &Value) -> anyhow::Result<String> {
                unreachable!()
            }
            async fn request_mint(
                &self,
                _: &CoinRequest,
                _: Option<&str>,
            ) -> anyhow::Result<MintResponse> {
                unreachable!()
            }
            async fn lookup_known_coin(&self, _: &str) -> anyhow::Result<Option<String>> {
                Ok(None)
            }
            async fn lookup_coin_map(&self, _: &str) -> anyhow::Result<Option<String>> {
                Ok(None)
            }
            async fn register_known_coin(&self, _: &str) -> anyhow::Result<()> {
                Ok(())
            }
            async fn register_coin_map(&self, _: &str, _: &str) -> anyhow::Result<()> {
                Ok(())
            }
            async fn register_points(&self, _: &str) -> anyhow::Result<()> {
                Ok(())
            }
        }

        let messaging = Arc::new(MockMessaging::default());
        let backend = Arc::new(FailingMint(MockBackend::default()));
        let d = Dispatcher::new(&test_config(), messaging.clone(), backend).unwrap();

        d.handle_message(message(ConversationKind::Direct, TRACK_ID))
            .await;

        let texts = messaging.texts.lock().unwrap();
        assert!(texts
            .last()
            .unwrap()
            .contains("Failed to fetch track from Spotify"));
    }
}

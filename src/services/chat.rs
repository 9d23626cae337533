use std::sync::Arc;

use crate::auth::AuthUser;
use crate::conversations::{self, ConversationStore, Message};
use crate::error::{RankerError, Result};
use crate::interfaces::providers::LlmProvider;
use crate::usage::{self, UsageStore};

/// Fixed product prompt sent with every generation call.
pub const SYSTEM_INSTRUCTION: &str = "Você é o Airbnb Ranker AI, um consultor sênior de SEO e conversão para o Airbnb.
Sua missão é analisar links de anúncios ou descrições e fornecer um diagnóstico estratégico.
Siga rigorosamente esta estrutura:
1. Resumo Executivo: Visão geral da saúde do anúncio.
2. P0 (Críticos): Erros que estão matando o ranking ou a conversão (fotos ruins, falta de descrição, preços errados).
3. P1 (Importantes): Melhorias que trarão ganho real de posição no ranking em 30 dias.
4. P2 (Marginais): Detalhes que tornam o anúncio perfeito (copywriting, tags extras).
Mantenha um tom profissional, direto e acionável.";

/// Persisted in place of an assistant reply the provider returned empty.
pub const FALLBACK_REPLY: &str =
    "Desculpe, não consegui processar a análise deste anúncio no momento.";

#[derive(Debug, Clone)]
pub struct Exchange {
    pub user_message: Message,
    pub assistant_message: Message,
}

pub struct ChatService {
    conversations: Arc<ConversationStore>,
    usage: Arc<UsageStore>,
    provider: Arc<dyn LlmProvider>,
    max_messages_per_day: i64,
}

impl ChatService {
    pub fn new(
        conversations: Arc<ConversationStore>,
        usage: Arc<UsageStore>,
        provider: Arc<dyn LlmProvider>,
        max_messages_per_day: i64,
    ) -> Self {
        Self {
            conversations,
            usage,
            provider,
            max_messages_per_day,
        }
    }

    /// Runs one chat turn. Order matters: the quota is checked before the
    /// generation call and charged only after it succeeds, and the user
    /// message is persisted before generation so a failed call leaves an
    /// observable incomplete exchange.
    pub async fn append_exchange(
        &self,
        user: &AuthUser,
        conversation_id: i32,
        text: &str,
    ) -> Result<Exchange> {
        let text = text.trim();
        if text.is_empty() {
            return Err(RankerError::Validation(
                "message must not be empty".to_string(),
            ));
        }

        let conversation = self
            .conversations
            .find_owned(conversation_id, user.id)
            .await?;

        let today = usage::today();
        let usage_record = self.usage.get_or_create(user.id, today).await?;
        if !usage_record.has_remaining(self.max_messages_per_day) {
            return Err(RankerError::QuotaExceeded);
        }

        let user_message = self
            .conversations
            .append_message(conversation.id, conversations::ROLE_USER, text)
            .await?;

        let reply = match self.provider.generate_text(text, SYSTEM_INSTRUCTION).await {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(
                    conversation_id = conversation.id,
                    user_id = user.id,
                    error = %err,
                    "generation call failed; exchange left incomplete"
                );
                return Err(err);
            }
        };
        let reply = if reply.trim().is_empty() {
            FALLBACK_REPLY.to_string()
        } else {
            reply
        };

        let assistant_message = self
            .conversations
            .append_message(conversation.id, conversations::ROLE_ASSISTANT, &reply)
            .await?;
        self.conversations.touch(conversation.id).await?;
        self.usage.increment(usage_record.id).await?;

        Ok(Exchange {
            user_message,
            assistant_message,
        })
    }
}

//! Grade role selection: the button message and the role swap behind it.

use ycnotice::StateStore;

use crate::{
    client::DiscordClient,
    error::DiscordError,
    model::{ActionRow, Button, CreateMessage, Embed, parse_snowflake},
};

/// State key of the selection message id in the role state file.
pub const ROLE_MESSAGE_KEY: &str = "role_message_id";

const CUSTOM_ID_PREFIX: &str = "grade:";
const EMBED_COLOR: u32 = 0x5865F2;

/// Role ids of grades 1 to 4. A member keeps at most one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradeRoles([u64; 4]);

/// Role edits needed to move a member to a grade.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleChange {
    pub remove: Vec<u64>,
    pub add: Option<u64>,
}

impl GradeRoles {
    pub fn new(roles: [u64; 4]) -> Self {
        Self(roles)
    }

    pub fn role_for_grade(&self, grade: u8) -> Result<u64, DiscordError> {
        match grade {
            1..=4 => Ok(self.0[usize::from(grade - 1)]),
            _ => Err(DiscordError::UnknownGrade(grade)),
        }
    }

    pub fn custom_id(grade: u8) -> String {
        format!("{CUSTOM_ID_PREFIX}{grade}")
    }

    /// Drops every other grade role the member holds and adds the target one
    /// unless it is already there.
    pub fn plan(&self, current: &[u64], grade: u8) -> Result<RoleChange, DiscordError> {
        let target = self.role_for_grade(grade)?;
        let remove = current
            .iter()
            .copied()
            .filter(|role| *role != target && self.0.contains(role))
            .collect();
        let add = (!current.contains(&target)).then_some(target);
        Ok(RoleChange { remove, add })
    }
}

/// The selection message: an embed and one button per grade.
pub fn selection_message() -> CreateMessage {
    let buttons = (1..=4)
        .map(|grade| Button::primary(format!("{grade}학년"), GradeRoles::custom_id(grade)))
        .collect();
    CreateMessage {
        embeds: vec![Embed {
            title: Some("🎓 학년 역할 선택".to_string()),
            description: Some(
                "아래 버튼을 눌러 학년 역할을 받아 주세요.\n학년 역할은 하나만 유지되며, 다른 학년을 누르면 기존 역할이 바뀌어요."
                    .to_string(),
            ),
            color: Some(EMBED_COLOR),
            ..Default::default()
        }],
        components: vec![ActionRow::new(buttons)],
        ..Default::default()
    }
}

/// Updates the stored selection message in place, or posts a new one and
/// remembers its id when there is none or it can no longer be edited.
#[tracing::instrument(skip(discord, store))]
pub async fn ensure_role_message(
    discord: &DiscordClient,
    store: &StateStore,
    channel_id: u64,
) -> Result<u64, DiscordError> {
    let channel = discord.get_channel(channel_id).await?;
    if !channel.is_messageable() {
        return Err(DiscordError::NotMessageable(channel_id));
    }

    let message = selection_message();
    let stored = store
        .load(ROLE_MESSAGE_KEY)
        .await
        .and_then(|id| id.parse::<u64>().ok());

    if let Some(message_id) = stored {
        match discord.edit_message(channel_id, message_id, &message).await {
            Ok(_) => {
                tracing::info!(message_id, "role message updated");
                return Ok(message_id);
            }
            Err(e) => tracing::warn!(message_id, error = %e, "cannot edit role message, posting a new one"),
        }
    }

    let created = discord.create_message(channel_id, &message, &[]).await?;
    let message_id = parse_snowflake(&created.id)?;
    store.save(ROLE_MESSAGE_KEY, &created.id).await?;
    tracing::info!(message_id, "role message posted");
    Ok(message_id)
}

/// Gives `user_id` the role of `grade`, removing their other grade roles.
#[tracing::instrument(skip(discord, roles))]
pub async fn assign_grade(
    discord: &DiscordClient,
    roles: &GradeRoles,
    guild_id: u64,
    user_id: u64,
    grade: u8,
) -> Result<RoleChange, DiscordError> {
    let member = discord.get_member(guild_id, user_id).await?;
    let change = roles.plan(&member.role_ids(), grade)?;

    for role in &change.remove {
        discord.remove_member_role(guild_id, user_id, *role).await?;
    }
    if let Some(role) = change.add {
        discord.add_member_role(guild_id, user_id, role).await?;
    }
    tracing::info!(removed = ?change.remove, added = ?change.add, "grade role assigned");
    Ok(change)
}

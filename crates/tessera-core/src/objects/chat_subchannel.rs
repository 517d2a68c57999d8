//! Sub-channel of a chat.
//!
//! Identity: subtype = chat instance uuid, id = `<chat id>/<subchannel id>`.
//! The kind has no export template yet and always declines export.

use super::meta::{MetaOption, MetaOptions, MetaValue, ObjectMeta};
use super::{AilObject, ObjectBase};
use crate::context::Context;
use crate::export::ExportObject;
use crate::primitives::{ACCOUNT_ICON_COLOR, DEFAULT_ICON_RADIUS, MESSAGES_PREFIX};
use crate::{ObjectType, SvgIcon, TesseraError};

const NAME_TIMELINE: &str = "name";

pub struct ChatSubChannel {
    base: ObjectBase,
}

impl ChatSubChannel {
    pub fn new(subtype: &str, id: &str) -> Result<Self, TesseraError> {
        Ok(Self {
            base: ObjectBase::new(ObjectType::ChatSubChannel, subtype, id)?,
        })
    }

    fn messages_key(&self) -> String {
        format!("{MESSAGES_PREFIX}:{}", self.base.gid())
    }

    /// Current name of the sub-channel.
    pub fn get_name(&self, ctx: &Context) -> Result<Option<String>, TesseraError> {
        self.base.timeline(ctx.store(), NAME_TIMELINE).get_last_value()
    }

    /// Every name the sub-channel had, oldest first.
    pub fn get_names(&self, ctx: &Context) -> Result<Vec<String>, TesseraError> {
        self.base.timeline(ctx.store(), NAME_TIMELINE).get_all_values()
    }

    pub fn update_name(&self, ctx: &Context, name: &str, timestamp: i64) -> Result<(), TesseraError> {
        self.base.register(ctx.store())?;
        self.base
            .timeline(ctx.store(), NAME_TIMELINE)
            .add_timestamp(timestamp, name)
    }

    /// Global id of the parent chat.
    pub fn get_chat(&self, ctx: &Context) -> Result<Option<String>, TesseraError> {
        self.base.get_field(ctx.store(), "chat")
    }

    pub fn set_chat(&self, ctx: &Context, chat: &str) -> Result<(), TesseraError> {
        self.base.set_field(ctx.store(), "chat", chat)
    }

    pub fn get_img(&self, ctx: &Context) -> Result<Option<String>, TesseraError> {
        self.base.get_field(ctx.store(), "img")
    }

    pub fn set_img(&self, ctx: &Context, img: &str) -> Result<(), TesseraError> {
        self.base.set_field(ctx.store(), "img", img)
    }

    pub fn add_message(&self, ctx: &Context, message_id: &str) -> Result<bool, TesseraError> {
        self.base.register(ctx.store())?;
        ctx.store().sadd(&self.messages_key(), message_id)
    }

    pub fn get_nb_messages(&self, ctx: &Context) -> Result<u64, TesseraError> {
        Ok(ctx.store().smembers(&self.messages_key())?.len() as u64)
    }
}

impl AilObject for ChatSubChannel {
    fn base(&self) -> &ObjectBase {
        &self.base
    }

    fn svg_icon(&self) -> SvgIcon {
        SvgIcon::new("fas", "\u{f086}", ACCOUNT_ICON_COLOR, DEFAULT_ICON_RADIUS)
    }

    fn get_meta(&self, ctx: &Context, options: &MetaOptions) -> Result<ObjectMeta, TesseraError> {
        let mut meta =
            self.base
                .base_meta(ctx.store(), ctx.settings(), options, self.svg_icon())?;
        meta.tags = Some(self.base.get_tags(ctx.store())?);
        meta.insert_field("name", self.get_name(ctx)?);

        if options.contains(MetaOption::Chat) {
            meta.insert(MetaOption::Chat, self.get_chat(ctx)?);
        }
        if options.contains(MetaOption::Img) {
            meta.insert(MetaOption::Img, self.get_img(ctx)?);
        }
        if options.contains(MetaOption::NbMessages) {
            meta.insert(MetaOption::NbMessages, MetaValue::Count(self.get_nb_messages(ctx)?));
        }
        Ok(meta)
    }

    fn to_export_object(&self, _ctx: &Context) -> Result<Option<ExportObject>, TesseraError> {
        Ok(None)
    }

    fn delete(&self, ctx: &Context) -> Result<(), TesseraError> {
        ctx.store().delete(&self.messages_key())?;
        self.base.purge(ctx.store())
    }
}

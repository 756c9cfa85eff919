use iced::widget::image::Handle;
use iced::widget::{column, container, image, row, text, Space};
use iced::{ContentFit, Element, Length};

use super::window::MountedItem;
use crate::cache::{Response, ResponseOrigin};
use crate::Message;

/// Image state of a mounted card
#[derive(Debug, Clone)]
pub enum CardImage {
    /// Requested from the offline cache, not back yet
    Loading,
    Ready(Handle),
    /// Neither network nor cache had it; holds the placeholder if one decoded
    Unavailable(Option<Handle>),
}

/// Render handle the windower keeps per mounted card.
/// Dropped on unmount, which releases the decoded image.
#[derive(Debug, Clone)]
pub struct CardHandle {
    pub image: CardImage,
}

impl CardHandle {
    pub fn loading() -> Self {
        Self {
            image: CardImage::Loading,
        }
    }

    /// Apply the cache coordinator's answer for this card's image
    pub fn resolve(&mut self, response: Response) {
        self.image = if response.is_success() && !response.body.is_empty() {
            CardImage::Ready(Handle::from_bytes(response.body))
        } else if response.origin == ResponseOrigin::Synthetic && !response.body.is_empty() {
            CardImage::Unavailable(Some(Handle::from_bytes(response.body)))
        } else {
            CardImage::Unavailable(None)
        };
    }

    #[cfg(test)]
    pub fn is_loading(&self) -> bool {
        matches!(self.image, CardImage::Loading)
    }
}

/// Build one card, exactly `extent` tall so the list geometry holds
pub fn view(item: &MountedItem<CardHandle>, extent: f32) -> Element<'_, Message> {
    let picture: Element<'_, Message> = match &item.handle.image {
        CardImage::Loading => container(text("Loading…").size(14))
            .center(Length::Fill)
            .into(),
        CardImage::Ready(handle) => image(handle.clone())
            .width(Length::Fill)
            .height(Length::Fill)
            .content_fit(ContentFit::Cover)
            .into(),
        CardImage::Unavailable(placeholder) => {
            let label = text("Image unavailable offline").size(14);
            match placeholder {
                Some(handle) => column![image(handle.clone()).width(64.0).height(64.0), label]
                    .spacing(8)
                    .align_x(iced::Alignment::Center)
                    .into(),
                None => label.into(),
            }
        }
    };

    let caption = row![
        text(&item.entry.author).size(14),
        Space::with_width(Length::Fill),
        text(&item.entry.category).size(12),
    ];

    container(
        column![
            container(picture).center_x(Length::Fill).height(Length::Fill),
            caption
        ]
        .spacing(8),
    )
    .padding(12)
    .width(Length::Fill)
    .height(Length::Fixed(extent))
    .into()
}

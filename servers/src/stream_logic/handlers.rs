//! Demo subscriptions wired up by `server_stream`: every new listing and
//! every collection offer across all collections.

use lib_stream::{EventKind, EventPayload, Message, StreamClient, Subscription};

/// Image of the listed item, if the frame is a listing that carries one.
pub fn listing_image(msg: &Message) -> Option<&str> {
    match &msg.payload {
        EventPayload::ItemListed(listed) => listed.item.metadata.image_url.as_deref(),
        _ => None,
    }
}

/// Slug of the collection an offer was made on.
pub fn offer_collection(msg: &Message) -> Option<&str> {
    match &msg.payload {
        EventPayload::CollectionOffer(offer) => Some(offer.collection.slug.as_str()),
        _ => None,
    }
}

pub fn register(client: &StreamClient) -> Vec<Subscription> {
    let listed = client.subscribe("*", EventKind::ItemListed, |msg| {
        match listing_image(msg) {
            Some(image) => log::info!("Item listed: {}", image),
            None => log::debug!("Item listed without image on {}", msg.topic),
        }
        Ok(())
    });

    let offers = client.subscribe("*", EventKind::CollectionOffer, |msg| {
        if let Some(slug) = offer_collection(msg) {
            log::info!("Collection offer: {}", slug);
        }
        Ok(())
    });

    vec![listed, offers]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_image_and_offer_slug() {
        let listed = Message::decode(
            r#"{"topic":"collection:*","event":"item_listed","ref":null,"payload":{
                "event_type":"item_listed","payload":{"item":{"metadata":{"image_url":"https://img/9.png"}}}}}"#,
        )
        .unwrap();
        assert_eq!(listing_image(&listed), Some("https://img/9.png"));
        assert_eq!(offer_collection(&listed), None);

        let offer = Message::decode(
            r#"{"topic":"collection:*","event":"collection_offer","ref":null,"payload":{
                "event_type":"collection_offer","payload":{"collection":{"slug":"azuki"}}}}"#,
        )
        .unwrap();
        assert_eq!(offer_collection(&offer), Some("azuki"));
        assert_eq!(listing_image(&offer), None);
    }
}

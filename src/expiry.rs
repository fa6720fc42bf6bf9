use {
    crate::{
        protocol::Reply,
        server::SHOULD_EXIT,
        state::{
            AuctionState,
            Listing,
            Store,
        },
    },
    anyhow::Result,
    std::{
        sync::{
            atomic::Ordering,
            Arc,
        },
        time::Duration,
    },
    time::OffsetDateTime,
};

/// How often expired listings are settled. Expiry reaction latency is
/// bounded by one interval.
pub const SWEEP_INTERVAL: Duration = Duration::from_millis(100);

/// Background sweeper: the only component allowed to remove a listing.
/// Each cycle takes the store lock once, settles every listing whose expiry
/// instant has passed, and sleeps.
pub async fn run_expiry_loop(store: Arc<Store>) -> Result<()> {
    tracing::info!("Starting expiry sweeper...");
    while !SHOULD_EXIT.load(Ordering::Acquire) {
        {
            let mut auction = store.auction.lock().await;
            sweep(&mut auction, OffsetDateTime::now_utc());
        }
        tokio::time::sleep(SWEEP_INTERVAL).await;
    }
    tracing::info!("Shutting down expiry sweeper...");
    Ok(())
}

/// Settle and remove every listing expired as of `now`, preserving the
/// relative order of the survivors. Runs under the store lock, so removal is
/// atomic with the notifications it triggers: a bid racing this sweep either
/// lands before it (and is honored) or after it (and is rejected as unknown).
pub fn sweep(state: &mut AuctionState, now: OffsetDateTime) {
    state.listings.retain(|listing| {
        if listing.expiry > now {
            return true;
        }
        settle(listing);
        false
    });
}

/// Notify the parties of one expired listing. Sessions that have since
/// disconnected are skipped; a departed bidder's win is still recorded as a
/// sale for the seller.
fn settle(listing: &Listing) {
    match &listing.top_bidder {
        None => {
            tracing::info!(item = %listing.item, "Listing expired unsold");
            if listing.seller_live {
                listing.seller.send(Reply::Unsold {
                    item: listing.item.clone(),
                });
            }
        }
        Some(top_bidder) => {
            tracing::info!(
                item = %listing.item,
                amount = listing.highest_bid,
                "Listing expired sold"
            );
            if listing.seller_live {
                listing.seller.send(Reply::Sold {
                    item:   listing.item.clone(),
                    amount: listing.highest_bid,
                });
            }
            if listing.bidder_live {
                top_bidder.send(Reply::Won {
                    item:   listing.item.clone(),
                    amount: listing.highest_bid,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::state::{
            ClientHandle,
            SessionId,
        },
        time::Duration,
        tokio::sync::mpsc,
    };

    struct TestClient {
        handle:   ClientHandle,
        receiver: mpsc::UnboundedReceiver<String>,
    }

    impl TestClient {
        fn new(id: SessionId) -> Self {
            let (sender, receiver) = mpsc::unbounded_channel();
            Self {
                handle: ClientHandle::new(id, sender),
                receiver,
            }
        }

        fn recv(&mut self) -> String {
            self.receiver.try_recv().expect("expected a reply line")
        }

        fn assert_silent(&mut self) {
            assert!(self.receiver.try_recv().is_err(), "unexpected reply line");
        }
    }

    fn listing(item: &str, seller: &ClientHandle, expires_in_secs: i64) -> Listing {
        Listing {
            item:        item.to_string(),
            reserve:     10,
            duration:    30,
            expiry:      OffsetDateTime::now_utc() + Duration::seconds(expires_in_secs),
            highest_bid: 0,
            seller:      seller.clone(),
            seller_live: true,
            top_bidder:  None,
            bidder_live: false,
        }
    }

    #[test]
    fn test_unsold_listing_notifies_seller_once() {
        let mut seller = TestClient::new(1);
        let mut state = AuctionState::default();
        state.listings.push(listing("widget", &seller.handle, -1));

        sweep(&mut state, OffsetDateTime::now_utc());

        assert_eq!(seller.recv(), ":unsold widget");
        seller.assert_silent();
        assert!(state.listings.is_empty());
    }

    #[test]
    fn test_sold_listing_notifies_seller_and_winner() {
        let mut seller = TestClient::new(1);
        let mut bidder = TestClient::new(2);
        let mut state = AuctionState::default();

        let mut expired = listing("widget", &seller.handle, -1);
        expired.highest_bid = 15;
        expired.top_bidder = Some(bidder.handle.clone());
        expired.bidder_live = true;
        state.listings.push(expired);

        sweep(&mut state, OffsetDateTime::now_utc());

        assert_eq!(seller.recv(), ":sold widget 15");
        assert_eq!(bidder.recv(), ":won widget 15");
        seller.assert_silent();
        bidder.assert_silent();
        assert!(state.listings.is_empty());
    }

    #[test]
    fn test_disconnected_parties_are_skipped() {
        let mut seller = TestClient::new(1);
        let mut bidder = TestClient::new(2);
        let mut state = AuctionState::default();

        let mut expired = listing("widget", &seller.handle, -1);
        expired.highest_bid = 15;
        expired.top_bidder = Some(bidder.handle.clone());
        expired.bidder_live = true;
        state.listings.push(expired);
        state.mark_disconnected(bidder.handle.id);

        sweep(&mut state, OffsetDateTime::now_utc());

        // Sale still happens; only the notification to the departed bidder
        // is suppressed.
        assert_eq!(seller.recv(), ":sold widget 15");
        bidder.assert_silent();
        assert!(state.listings.is_empty());
    }

    #[test]
    fn test_sweep_keeps_unexpired_listings_in_order() {
        let mut seller = TestClient::new(1);
        let mut state = AuctionState::default();
        state.listings.push(listing("first", &seller.handle, 30));
        state.listings.push(listing("stale", &seller.handle, -1));
        state.listings.push(listing("second", &seller.handle, 30));

        sweep(&mut state, OffsetDateTime::now_utc());

        assert_eq!(seller.recv(), ":unsold stale");
        let remaining: Vec<&str> = state
            .listings
            .iter()
            .map(|listing| listing.item.as_str())
            .collect();
        assert_eq!(remaining, ["first", "second"]);
    }

    #[test]
    fn test_listing_expiring_exactly_now_is_settled() {
        let mut seller = TestClient::new(1);
        let mut state = AuctionState::default();
        let now = OffsetDateTime::now_utc();
        let mut expired = listing("widget", &seller.handle, 0);
        expired.expiry = now;
        state.listings.push(expired);

        sweep(&mut state, now);

        assert_eq!(seller.recv(), ":unsold widget");
        assert!(state.listings.is_empty());
    }
}

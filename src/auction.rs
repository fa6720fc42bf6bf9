use {
    crate::{
        protocol::{
            Command,
            ListEntry,
            Reply,
        },
        state::{
            AuctionState,
            ClientHandle,
            Listing,
        },
    },
    time::{
        Duration,
        OffsetDateTime,
    },
};

/// Process one request line from `client`. Must be called with the store
/// lock held: the state transition and every reply or notification it
/// triggers are queued inside the same critical section, so no other session
/// can observe a torn state in between.
pub fn handle_line(state: &mut AuctionState, client: &ClientHandle, line: &str) {
    match Command::parse(line) {
        Some(Command::Sell {
            item,
            reserve,
            duration,
        }) => sell(state, client, item, reserve, duration),
        Some(Command::Bid { item, amount }) => bid(state, client, item, amount),
        Some(Command::List) => list(state, client),
        None => client.send(Reply::Invalid),
    }
}

/// List a new item. The item name must not collide with any active listing;
/// numeric validation already happened during parsing.
fn sell(state: &mut AuctionState, client: &ClientHandle, item: &str, reserve: i64, duration: i64) {
    if state.find(item).is_some() {
        client.send(Reply::Rejected);
        return;
    }

    let listing = Listing {
        item: item.to_string(),
        reserve,
        duration,
        expiry: OffsetDateTime::now_utc() + Duration::seconds(duration),
        highest_bid: 0,
        seller: client.clone(),
        seller_live: true,
        top_bidder: None,
        bidder_live: false,
    };
    tracing::debug!(
        item = %listing.item,
        reserve = listing.reserve,
        duration = listing.duration,
        session = client.id,
        "Item listed"
    );
    state.listings.push(listing);
    client.send(Reply::Listed {
        item: item.to_string(),
    });
}

/// Place a bid. Rejected without state change when the item is unknown, the
/// bidder is the listing's still-connected seller, the amount is below the
/// reserve or not above the current highest bid, or the bidder already holds
/// the top bid and is still connected. An accepted bid notifies the displaced
/// bidder (if still connected) before recording the new top bid.
fn bid(state: &mut AuctionState, client: &ClientHandle, item: &str, amount: i64) {
    let Some(listing) = state.find_mut(item) else {
        client.send(Reply::Rejected);
        return;
    };

    if (listing.seller.id == client.id && listing.seller_live)
        || amount < listing.reserve
        || amount <= listing.highest_bid
    {
        client.send(Reply::Rejected);
        return;
    }

    if let Some(top_bidder) = &listing.top_bidder {
        if top_bidder.id == client.id && listing.bidder_live {
            // A session already holding the top bid cannot outbid itself.
            client.send(Reply::Rejected);
            return;
        }
        if listing.bidder_live {
            top_bidder.send(Reply::Outbid {
                item:   listing.item.clone(),
                amount,
            });
        }
    }

    listing.highest_bid = amount;
    listing.top_bidder = Some(client.clone());
    listing.bidder_live = true;
    tracing::debug!(item, amount, session = client.id, "Bid accepted");
    client.send(Reply::Bid {
        item: item.to_string(),
    });
}

/// Enumerate all active listings in insertion order.
fn list(state: &AuctionState, client: &ClientHandle) {
    let now = OffsetDateTime::now_utc();
    let entries = state
        .listings
        .iter()
        .map(|listing| ListEntry {
            item:         listing.item.clone(),
            reserve:      listing.reserve,
            highest_bid:  listing.highest_bid,
            remaining_ms: listing.remaining_ms(now),
        })
        .collect();
    client.send(Reply::List { entries });
}

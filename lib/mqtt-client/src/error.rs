// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("client is not in the right phase for this call")]
    InvalidState,
    #[error("operation timed out")]
    Timeout,
    #[error("outbox is full")]
    OutboxFull,
    #[error("no matching outbox entry")]
    NotFound,
    #[error("broker refused the connection: {0:?}")]
    ConnectRefused(mqttbytes::v4::ConnectReturnCode),
    #[error("transport error: {0}")]
    Net(#[from] net_core::Error),
    #[error("MQTT codec error: {0}")]
    Mqtt(#[from] mqttbytes::Error),
}

pub type Result<T> = core::result::Result<T, Error>;

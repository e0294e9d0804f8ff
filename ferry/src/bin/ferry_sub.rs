// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use ferry::{subscriber, Error};

fn main() -> Result<(), Error> {
    env_logger::init();

    subscriber::run_subscriber()
}

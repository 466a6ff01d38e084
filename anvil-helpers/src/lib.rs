pub mod anvil_helpers {
    use std::sync::mpsc::{self, Sender};

    use std::process::{Command, ExitStatus, Stdio};
    use std::thread::{self, sleep, JoinHandle};

    use std::net::TcpStream;
    use std::time::{Duration, Instant};
    use tracing::{event, Level};

    pub const DEFAULT_PORT: u16 = 8545;

    const STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

    pub struct Account {
        pub public_key: &'static str,
        pub private_key: &'static str,
    }

    /// Accounts of the default `test test ... junk` mnemonic, pre-funded by anvil.
    pub const DEV_ACCOUNTS: [Account; 6] = [
        Account {
            public_key: "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
            private_key: "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        },
        Account {
            public_key: "0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
            private_key: "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
        },
        Account {
            public_key: "0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC",
            private_key: "0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a",
        },
        Account {
            public_key: "0x90F79bf6EB2c4f870365E785982E1f101E93b906",
            private_key: "0x7c852118294e51e653712a81e05800f419141751be58f605c371e15141b007a6",
        },
        Account {
            public_key: "0x15d34AAf54267DB7D7c367839AAf71A00a2C6A65",
            private_key: "0x47e179ec197488593b187f80a00eb0da91f1b9d0b13f8733639f19c30a34926a",
        },
        Account {
            public_key: "0x9965507D1a55bcC2695C58ba16FB37d819B0A4dc",
            private_key: "0x8b3a350cf5c34c9194ca85829a2df0ec3153be0318b5e2d3348e872092edffba",
        },
    ];

    pub fn is_port_open(host: &str, port: u16) -> bool {
        TcpStream::connect(format!("{}:{}", host, port)).is_ok()
    }

    /// A local anvil node running in a child process until `kill` is called.
    pub struct Anvil {
        pub port: u16,
        pub accounts: &'static [Account],
        thread: JoinHandle<Result<ExitStatus, String>>,
        sender_parent_to_child: Sender<bool>,
    }

    impl Anvil {
        /// Starts `anvil` on `port` (8545 by default). Without a block time every
        /// transaction is mined on arrival.
        pub fn spawn(port: Option<u16>, block_time_s: Option<u32>) -> Result<Self, String> {
            let port = port.unwrap_or(DEFAULT_PORT);

            event!(Level::DEBUG, "New anvil on port {}", port);

            if is_port_open("127.0.0.1", port) {
                return Err(format!("Port {} is already in use", port));
            }

            let (sender_child_to_parent, receiver_child_to_parent) =
                mpsc::channel::<Result<(), String>>();
            let (sender_parent_to_child, receiver_parent_to_child) = mpsc::channel::<bool>();

            let thread = thread::spawn(move || {
                let mut cmd = Command::new("anvil");

                cmd.arg("-p");
                cmd.arg(format!("{}", port));

                if let Some(block_time_s) = block_time_s {
                    cmd.arg("--block-time");
                    cmd.arg(format!("{}", block_time_s));
                }

                cmd.stdin(Stdio::null());
                cmd.stdout(Stdio::null());
                cmd.stderr(Stdio::null());

                let mut child = match cmd.spawn() {
                    Err(error) => {
                        let error = format!("Failed to start anvil: {}", error);
                        let _ = sender_child_to_parent.send(Err(error.clone()));
                        return Err(error);
                    }
                    Ok(child) => child,
                };

                let started = Instant::now();
                while !is_port_open("127.0.0.1", port) {
                    if started.elapsed() > STARTUP_TIMEOUT {
                        let _ = child.kill();
                        let error = format!("anvil did not open port {} in time", port);
                        let _ = sender_child_to_parent.send(Err(error.clone()));
                        return Err(error);
                    }
                    sleep(Duration::from_millis(100));
                }

                sender_child_to_parent
                    .send(Ok(()))
                    .map_err(|err| err.to_string())?;

                // Either an explicit kill or the parent handle being dropped.
                let _ = receiver_parent_to_child.recv();

                child.kill().map_err(|err| err.to_string())?;
                child.wait().map_err(|err| err.to_string())
            });

            receiver_child_to_parent
                .recv()
                .map_err(|err| err.to_string())??;

            event!(Level::INFO, "anvil listening on port {}", port);

            Ok(Anvil {
                port,
                accounts: &DEV_ACCOUNTS,
                thread,
                sender_parent_to_child,
            })
        }

        pub fn endpoint(&self) -> String {
            format!("http://127.0.0.1:{}", self.port)
        }

        pub fn kill(self) -> Result<(), String> {
            let _ = self.sender_parent_to_child.send(true);

            let status = self
                .thread
                .join()
                .map_err(|_| "anvil thread panicked".to_string())??;

            event!(Level::DEBUG, "anvil exited with {}", status);

            Ok(())
        }
    }
}
